//! Protocol statistics collectors.
//!
//! Both collectors walk the enabled protocols in sorted order and query the
//! per-operation and total statistics of each. The node collector also
//! reports client counts; connected-client statistics are not tracked per
//! protocol version, so every NFS and SMB variant collapses onto one
//! family key that is queried once per pass.

mod cluster;
mod node;

use std::collections::BTreeMap;
use std::fmt;

pub(crate) use cluster::ClusterProtocolCollector;
pub(crate) use node::NodeProtocolCollector;

use crate::client::protostats::{PROTO_FIELD_NAMES, ProtoFields};
use crate::metrics::{Desc, SampleSink};

/// Known protocol identifiers and whether they are collected by default.
pub const PROTOCOL_DEFAULTS: [(&str, bool); 16] = [
    ("cifs", false),
    ("ftp", true),
    ("hdfs", false),
    ("http", false),
    ("irp", false),
    ("jobd", true),
    ("lsass_in", true),
    ("lsass_out", true),
    ("nfs", true),
    ("nfs3", true),
    ("nfs4", false),
    ("nlm", false),
    ("papi", true),
    ("siq", true),
    ("smb1", false),
    ("smb2", true),
];

/// Protocol versions that share one connected-client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFamily {
    Nfs,
    Smb,
}

impl ProtocolFamily {
    pub fn of(protocol: &str) -> Option<Self> {
        if protocol.starts_with("nfs") {
            Some(ProtocolFamily::Nfs)
        } else if protocol.starts_with("smb") {
            Some(ProtocolFamily::Smb)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolFamily::Nfs => "nfs",
            ProtocolFamily::Smb => "smb",
        }
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which protocols the protocol collectors query. Fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolEnablement {
    states: BTreeMap<String, bool>,
}

impl Default for ProtocolEnablement {
    fn default() -> Self {
        Self {
            states: PROTOCOL_DEFAULTS
                .iter()
                .map(|(name, enabled)| (name.to_string(), *enabled))
                .collect(),
        }
    }
}

impl ProtocolEnablement {
    /// Starts from the defaults and applies `--protocol.enable` then `--protocol.disable`.
    pub fn from_toggles(enable: &[String], disable: &[String]) -> Result<Self, String> {
        let mut protocols = Self::default();
        for name in enable {
            protocols.set(name, true)?;
        }
        for name in disable {
            protocols.set(name, false)?;
        }
        Ok(protocols)
    }

    pub fn set(&mut self, protocol: &str, enabled: bool) -> Result<(), String> {
        match self.states.get_mut(protocol) {
            Some(state) => {
                *state = enabled;
                Ok(())
            }
            None => Err(format!("unknown protocol: {protocol}")),
        }
    }

    pub fn is_enabled(&self, protocol: &str) -> bool {
        self.states.get(protocol).copied().unwrap_or(false)
    }

    /// Enabled protocols in sorted order.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
    }
}

fn field_help(field: &str) -> &'static str {
    match field {
        "in_max" => "Maximum inbound bytes per operation",
        "in_min" => "Minimum inbound bytes per operation",
        "in_rate" => "Inbound bytes per second",
        "out_max" => "Maximum outbound bytes per operation",
        "out_min" => "Minimum outbound bytes per operation",
        "out_rate" => "Outbound bytes per second",
        "op_count" => "Number of operations",
        "op_rate" => "Operations per second",
        "time_avg" => "Average operation latency in microseconds",
        "time_max" => "Maximum operation latency in microseconds",
        "time_min" => "Minimum operation latency in microseconds",
        _ => "Protocol statistic",
    }
}

/// One gauge per protocol statistics field, all sharing the same labels.
pub(crate) struct FieldDescs<const N: usize> {
    descs: [Desc<N>; 11],
}

impl<const N: usize> FieldDescs<N> {
    pub(crate) fn new(subsystem: &str, prefix: &str, scope: &str, labels: [&'static str; N]) -> Self {
        Self {
            descs: std::array::from_fn(|i| {
                let field = PROTO_FIELD_NAMES[i];
                Desc::new(
                    subsystem,
                    &format!("{prefix}_{field}"),
                    format!("{} ({scope}).", field_help(field)),
                    labels,
                )
            }),
        }
    }

    pub(crate) fn emit(&self, fields: &ProtoFields, labels: [&str; N], sink: &mut SampleSink) {
        for (desc, value) in self.descs.iter().zip(fields.values()) {
            sink.emit(desc.sample(value, labels));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_of() {
        assert_eq!(ProtocolFamily::of("nfs"), Some(ProtocolFamily::Nfs));
        assert_eq!(ProtocolFamily::of("nfs4"), Some(ProtocolFamily::Nfs));
        assert_eq!(ProtocolFamily::of("smb2"), Some(ProtocolFamily::Smb));
        assert_eq!(ProtocolFamily::of("nlm"), None);
        assert_eq!(ProtocolFamily::of("lsass_out"), None);
    }

    #[test]
    fn test_default_enablement_is_sorted() {
        let protocols = ProtocolEnablement::default();
        let enabled: Vec<_> = protocols.enabled().collect();
        assert_eq!(
            enabled,
            vec!["ftp", "jobd", "lsass_in", "lsass_out", "nfs", "nfs3", "papi", "siq", "smb2"]
        );
    }

    #[test]
    fn test_toggles() {
        let protocols =
            ProtocolEnablement::from_toggles(&["nfs4".into(), "smb1".into()], &["ftp".into()])
                .unwrap();
        assert!(protocols.is_enabled("nfs4"));
        assert!(protocols.is_enabled("smb1"));
        assert!(!protocols.is_enabled("ftp"));

        let err = ProtocolEnablement::from_toggles(&["gopher".into()], &[]).unwrap_err();
        assert_eq!(err, "unknown protocol: gopher");
    }

    #[test]
    fn test_field_descs_cover_every_field() {
        let descs = FieldDescs::new("node", "protostats_total", "per node", ["node", "proto"]);
        let mut sink = SampleSink::new();
        let fields = ProtoFields {
            op_rate: 12.5,
            ..Default::default()
        };
        descs.emit(&fields, ["1", "nfs3"], &mut sink);
        assert_eq!(sink.len(), 11);
        let op_rate = sink
            .samples()
            .iter()
            .find(|s| s.name() == "isilon_node_protostats_total_op_rate")
            .map(|s| s.value());
        assert_eq!(op_rate, Some(12.5));
    }
}

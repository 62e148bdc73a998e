use async_trait::async_trait;
use tracing::warn;

use super::{CollectError, Collector, PassContext};
use crate::client::types::{NodeHardware, NodesDrives, NodesStatus};
use crate::client::StatClient;
use crate::metrics::{Desc, SampleSink};

const NOT_AVAILABLE: &str = "n/a";

/// Battery, power supply and drive state per node, plus a hardware info gauge.
///
/// Status, drives and hardware are separate endpoints; each one that
/// answers is reported even when the others fail.
pub(crate) struct NodeInfoCollector {
    client: StatClient,
    battery: Desc<4>,
    power_supply: Desc<4>,
    drive_state: Desc<6>,
    info: Desc<19>,
}

impl NodeInfoCollector {
    pub(crate) fn new(client: StatClient) -> Self {
        Self {
            client,
            battery: Desc::new(
                "node",
                "battery_status",
                "NVRAM battery status: 0 when both test results passed, 1 otherwise.",
                ["node", "lnn", "result1", "result2"],
            ),
            power_supply: Desc::new(
                "node",
                "power_supply_status",
                "Power supply status: 0 = good, 1 = not good.",
                ["node", "lnn", "supply", "status"],
            ),
            drive_state: Desc::new(
                "node",
                "drive_state",
                "Drive state in a bay. 0 = HEALTHY/L3, 1 = STALLED, 2 = FW_UPDATE, 3 = SMARTFAIL, \
                 4 = USED, 5 = PREPARING, 10 = NEW, 11 = EMPTY, 12 = REPLACE, 99 = unknown.",
                ["node", "lnn", "bay", "device", "media", "model"],
            ),
            info: Desc::new(
                "node",
                "info",
                "Node hardware description in labels. Always 1.",
                [
                    "node",
                    "lnn",
                    "product",
                    "serial_number",
                    "class",
                    "family_code",
                    "generation_code",
                    "chassis",
                    "chassis_code",
                    "chassis_count",
                    "cpu",
                    "proc_count",
                    "proc_type",
                    "hwgen",
                    "nvram",
                    "disk_controller",
                    "disk_expander",
                    "infiniband",
                    "motherboard",
                ],
            ),
        }
    }

    fn emit_status(&self, status: &NodesStatus, sink: &mut SampleSink) {
        for node in &status.nodes {
            let id = node.id.to_string();
            let lnn = node.lnn.to_string();
            let battery = &node.batterystatus;
            let failing = !(test_passed(&battery.result1) && test_passed(&battery.result2));
            sink.emit(self.battery.sample(
                if failing { 1.0 } else { 0.0 },
                [id.as_str(), lnn.as_str(), battery.result1.as_str(), battery.result2.as_str()],
            ));

            for supply in &node.powersupplies.supplies {
                let supply_id = supply.id.to_string();
                let value = if supply.good == "Good" { 0.0 } else { 1.0 };
                sink.emit(
                    self.power_supply
                        .sample(value, [id.as_str(), lnn.as_str(), supply_id.as_str(), supply.status.as_str()]),
                );
            }
        }
    }

    fn emit_drives(&self, drives: &NodesDrives, sink: &mut SampleSink) {
        for node in &drives.nodes {
            let id = node.id.to_string();
            let lnn = node.lnn.to_string();
            for drive in &node.drives {
                let bay = drive.baynum.to_string();
                sink.emit(self.drive_state.sample(
                    drive_state_code(&drive.ui_state),
                    [
                        id.as_str(),
                        lnn.as_str(),
                        bay.as_str(),
                        drive.devname.as_str(),
                        drive.media_type.as_str(),
                        drive.model.as_str(),
                    ],
                ));
            }
        }
    }

    fn emit_info(&self, node: &NodeHardware, sink: &mut SampleSink) {
        let id = node.id.to_string();
        let lnn = node.lnn.to_string();
        let (proc_count, proc_type) = split_processor(&node.processor);
        sink.emit(self.info.sample(
            1.0,
            [
                id.as_str(),
                lnn.as_str(),
                first_word(&node.product),
                node.serial_number.as_str(),
                node.class.as_str(),
                node.family_code.as_str(),
                node.generation_code.as_str(),
                first_word(&node.chassis),
                node.chassis_code.as_str(),
                first_word(&node.chassis_count),
                first_word(&node.cpu),
                proc_count,
                proc_type,
                first_word(&node.hwgen),
                first_word(&node.nvram),
                first_word(&node.disk_controller),
                first_word(&node.disk_expander),
                first_word(&node.infiniband),
                first_word(&node.motherboard),
            ],
        ));
    }
}

#[async_trait]
impl Collector for NodeInfoCollector {
    fn name(&self) -> &'static str {
        "node_info"
    }

    async fn update(&self, _ctx: &PassContext, sink: &mut SampleSink) -> Result<(), CollectError> {
        let mut first_error = None;

        match self.client.nodes_status().await {
            Ok(status) => self.emit_status(&status, sink),
            Err(e) => {
                warn!(error = %e, "unable to read node status");
                first_error = Some(e);
            }
        }

        let drives = self.client.nodes_drives().await;
        match &drives {
            Ok(drives) => self.emit_drives(drives, sink),
            Err(e) => warn!(error = %e, "unable to read drive states"),
        }

        let hardware = self.client.nodes_hardware().await;
        match &hardware {
            Ok(hardware) => {
                for node in &hardware.nodes {
                    self.emit_info(node, sink);
                }
            }
            Err(e) => warn!(error = %e, "unable to read node hardware"),
        }

        match first_error {
            Some(e) if drives.is_err() && hardware.is_err() => Err(e.into()),
            _ => Ok(()),
        }
    }
}

fn test_passed(result: &str) -> bool {
    matches!(result, "passed" | "N/A")
}

fn drive_state_code(state: &str) -> f64 {
    match state {
        "HEALTHY" | "L3" => 0.0,
        "STALLED" => 1.0,
        "FW_UPDATE" => 2.0,
        "SMARTFAIL" => 3.0,
        "USED" => 4.0,
        "PREPARING" => 5.0,
        "NEW" => 10.0,
        "EMPTY" => 11.0,
        "REPLACE" => 12.0,
        _ => 99.0,
    }
}

/// Hardware descriptions are long free text; the first word identifies the part.
fn first_word(label: &str) -> &str {
    label.split_whitespace().next().unwrap_or(NOT_AVAILABLE)
}

/// Splits `"<count>,<type>"`.
fn split_processor(processor: &str) -> (&str, &str) {
    match processor.split_once(',') {
        Some((count, kind)) if !count.trim().is_empty() => (count.trim(), kind.trim()),
        _ => (NOT_AVAILABLE, NOT_AVAILABLE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiRequest;
    use crate::client::mock::MockTransport;
    use crate::collector::test_support::{run, value_of, values};

    #[test]
    fn test_helpers() {
        assert_eq!(first_word("Mellanox ConnectX-3 QDR"), "Mellanox");
        assert_eq!(first_word("X410"), "X410");
        assert_eq!(first_word(""), "n/a");
        assert_eq!(split_processor("2,Intel Xeon E5"), ("2", "Intel Xeon E5"));
        assert_eq!(split_processor("unknown"), ("n/a", "n/a"));
        assert_eq!(drive_state_code("L3"), 0.0);
        assert_eq!(drive_state_code("SMARTFAIL"), 3.0);
        assert_eq!(drive_state_code("bogus"), 99.0);
    }

    #[tokio::test]
    async fn test_typical_cluster() {
        let mock = MockTransport::typical_cluster();
        let (result, samples) = run(&NodeInfoCollector::new(StatClient::new(mock))).await;
        assert!(result.is_ok());

        assert_eq!(
            value_of(&samples, "isilon_node_battery_status", &[("node", "1")]),
            Some(0.0)
        );
        assert_eq!(
            value_of(&samples, "isilon_node_battery_status", &[("node", "2")]),
            Some(1.0)
        );
        assert_eq!(
            value_of(
                &samples,
                "isilon_node_power_supply_status",
                &[("node", "2"), ("supply", "2")]
            ),
            Some(1.0)
        );
        assert_eq!(
            value_of(&samples, "isilon_node_drive_state", &[("node", "1"), ("bay", "2")]),
            Some(3.0)
        );
        assert_eq!(
            value_of(
                &samples,
                "isilon_node_info",
                &[("lnn", "1"), ("proc_count", "2"), ("infiniband", "Mellanox")]
            ),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn test_partial_endpoints() {
        let mut mock = MockTransport::typical_cluster();
        mock.remove(&ApiRequest::new("/platform/3/cluster/nodes/all/status"));
        mock.remove(&ApiRequest::new("/platform/3/cluster/nodes/all/drives"));
        let (result, samples) = run(&NodeInfoCollector::new(StatClient::new(mock))).await;
        assert!(result.is_ok());
        assert_eq!(values(&samples, "isilon_node_info").len(), 2);
        assert!(values(&samples, "isilon_node_battery_status").is_empty());
    }

    #[tokio::test]
    async fn test_all_endpoints_down() {
        let (result, samples) =
            run(&NodeInfoCollector::new(StatClient::new(MockTransport::new()))).await;
        assert!(matches!(result, Err(CollectError::Client(_))));
        assert!(samples.is_empty());
    }
}

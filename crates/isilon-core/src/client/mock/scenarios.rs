//! Pre-built mock clusters.

use serde_json::{Value, json};

use super::MockTransport;
use crate::client::{ApiRequest, QuotaQuery};
use crate::client::types::QuotaType;

/// Reference "now" (unix seconds) that the typical cluster's snapshot times are relative to.
pub const SCENARIO_NOW: i64 = 1_760_000_000;

const DAY: i64 = 86_400;

/// Statistics records for nodes 1 and 2.
fn nodes(node1: f64, node2: f64) -> Value {
    json!([
        {"devid": 1, "key": "", "time": SCENARIO_NOW, "value": node1},
        {"devid": 2, "key": "", "time": SCENARIO_NOW, "value": node2}
    ])
}

/// Cluster-wide statistics record.
fn cluster(value: f64) -> Value {
    json!([{"devid": 0, "key": "", "time": SCENARIO_NOW, "value": value}])
}

/// Two-bay multi-value records for nodes 1 and 2.
fn bays(node1: [f64; 2], node2: [f64; 2]) -> Value {
    json!([
        {"devid": 1, "time": SCENARIO_NOW, "value": [{"bay1": node1[0]}, {"bay2": node1[1]}]},
        {"devid": 2, "time": SCENARIO_NOW, "value": [{"bay1": node2[0]}, {"bay2": node2[1]}]}
    ])
}

fn op(name: &str, class: &str, op_rate: f64, op_count: f64) -> Value {
    json!({
        "op_name": name, "class_name": class,
        "in_max": 65536, "in_min": 128, "in_rate": op_rate * 4096.0,
        "out_max": 65536, "out_min": 64, "out_rate": op_rate * 2048.0,
        "op_count": op_count, "op_rate": op_rate,
        "time_avg": 420.0, "time_max": 9000.0, "time_min": 15.0
    })
}

fn total(op_rate: f64, time_avg: f64) -> Value {
    json!({
        "in_max": 65536, "in_min": 64, "in_rate": op_rate * 3000.0,
        "out_max": 65536, "out_min": 64, "out_rate": op_rate * 1500.0,
        "op_count": op_rate * 60.0, "op_rate": op_rate,
        "time_avg": time_avg, "time_max": 12000.0, "time_min": 10.0
    })
}

fn quota(id: &str, path: &str, kind: &str, persona: Value, logical: f64) -> Value {
    json!({
        "id": id, "path": path, "type": kind,
        "container": kind == "directory", "enforced": true, "include_snapshots": false,
        "persona": persona,
        "usage": {"logical": logical, "physical": logical * 1.2, "inodes": logical / 4096.0},
        "thresholds": {
            "advisory": null, "advisory_exceeded": false, "advisory_last_exceeded": null,
            "soft": null, "soft_exceeded": false, "soft_last_exceeded": null, "soft_grace": null,
            "hard": 10_000_000_000_u64, "hard_exceeded": false, "hard_last_exceeded": null
        }
    })
}

impl MockTransport {
    /// A healthy two-node cluster answering every endpoint the default
    /// collectors, the quota collector and both protocol collectors use.
    pub fn typical_cluster() -> Self {
        let mut mock = Self::new();
        mock.add_statistics();
        mock.add_cluster_endpoints();
        mock.add_node_endpoints();
        mock.add_data_services();
        mock.add_quotas();
        mock.add_protocols();
        mock
    }

    fn add_statistics(&mut self) {
        // cpu: percentages in tenths, load in hundredths
        self.add_stat("node.cpu.count", nodes(16.0, 16.0));
        self.add_stat("node.cpu.idle.avg", nodes(812.0, 905.0));
        self.add_stat("node.cpu.user.avg", nodes(95.0, 40.0));
        self.add_stat("node.cpu.sys.avg", nodes(455.0, 55.0));
        self.add_stat("node.load.1min", nodes(250.0, 75.0));
        self.add_stat("node.load.5min", nodes(210.0, 80.0));
        self.add_stat("node.load.15min", nodes(190.0, 82.0));

        self.add_stat("node.memory.used", nodes(51_539_607_552.0, 48_318_382_080.0));
        self.add_stat("node.memory.free", nodes(17_179_869_184.0, 20_401_094_656.0));
        self.add_stat("node.memory.cache", nodes(8_589_934_592.0, 6_442_450_944.0));

        self.add_stat("node.disk.busy.all", bays([125.0, 30.0], [410.0, 0.0]));
        self.add_stat("node.disk.iosched.queue.all", bays([2.0, 0.0], [5.0, 1.0]));
        self.add_stat("node.disk.xfers.in.rate.all", bays([140.0, 12.0], [310.0, 3.0]));
        self.add_stat("node.disk.xfers.out.rate.all", bays([88.0, 9.0], [205.0, 1.0]));
        self.add_stat("node.disk.access.latency.all", bays([4100.0, 900.0], [7800.0, 0.0]));

        self.add_stat("node.net.ext.bytes.in.rate", nodes(125_000_000.0, 98_000_000.0));
        self.add_stat("node.net.ext.bytes.out.rate", nodes(310_000_000.0, 240_000_000.0));
        self.add_stat("node.net.ext.errors.in.rate", nodes(0.0, 0.0));
        self.add_stat("node.net.ext.errors.out.rate", nodes(0.0, 2.0));

        self.add_stat("ifs.bytes.total", cluster(500_000_000_000_000.0));
        self.add_stat("ifs.bytes.used", cluster(210_000_000_000_000.0));
        self.add_stat("ifs.bytes.avail", cluster(270_000_000_000_000.0));
        self.add_stat("ifs.bytes.free", cluster(290_000_000_000_000.0));
        self.add_stat("ifs.percent.used", cluster(42.0));
        self.add_stat("ifs.percent.avail", cluster(54.0));
        self.add_stat("ifs.percent.free", cluster(58.0));

        self.add_stat("node.ifs.bytes.free", nodes(145_000_000_000_000.0, 145_000_000_000_000.0));
        self.add_stat("node.ifs.bytes.used", nodes(105_000_000_000_000.0, 105_000_000_000_000.0));
        self.add_stat("node.ifs.bytes.total", nodes(250_000_000_000_000.0, 250_000_000_000_000.0));

        self.add_stat("node.disk.unhealthy.count", nodes(1.0, 0.0));
        self.add_stat("node.health", nodes(1.0, 0.0));
        self.add_stat("node.disk.count", nodes(2.0, 2.0));
        self.add_stat("node.boottime", nodes(1_759_000_000.0, 1_758_500_000.0));
        self.add_stat("node.uptime", nodes(1_000_000.0, 1_500_000.0));

        self.add_stat("cluster.health", cluster(0.0));
    }

    fn add_cluster_endpoints(&mut self) {
        self.add_response(
            ApiRequest::new("/platform/3/cluster/identity"),
            json!({"name": "isilon-prod", "description": "", "logon": {}}),
        );
        self.add_response(
            ApiRequest::new("/platform/3/cluster/config"),
            json!({
                "name": "isilon-prod",
                "onefs_version": {"release": "9.5.0.0", "build": "B_9_5_0_004(RELEASE)"}
            }),
        );
        self.add_response(
            ApiRequest::new("/platform/1/cluster/statfs"),
            json!({
                "f_bavail": 32_958_496_000_u64, "f_bfree": 35_400_126_000_u64,
                "f_blocks": 61_035_156_250_u64, "f_bsize": 8192,
                "f_ffree": 4_294_967_296_u64, "f_files": 8_589_934_592_u64,
                "f_flags": 0, "f_fstypename": "isi", "f_iosize": 8192,
                "f_mntfromname": "OneFS", "f_mntonname": "/ifs", "f_namemax": 255, "f_owner": 0,
                "f_type": 0, "f_version": 0
            }),
        );
    }

    fn add_node_endpoints(&mut self) {
        let statfs = |blocks: u64, free: u64, files: u64, ffree: u64| {
            json!({
                "f_bavail": free, "f_bfree": free, "f_blocks": blocks, "f_bsize": 4096,
                "f_ffree": ffree, "f_files": files, "f_mntonname": ""
            })
        };
        self.add_response(
            ApiRequest::new("/platform/3/cluster/nodes/all/partitions"),
            json!({"nodes": [
                {"id": 1, "lnn": 1, "count": 3, "partitions": [
                    {"mount_point": "/", "percent_used": "42%",
                     "statfs": statfs(1_000_000, 580_000, 500_000, 400_000)},
                    {"mount_point": "/var", "percent_used": "18%",
                     "statfs": statfs(500_000, 410_000, 1000, 750)},
                    {"mount_point": "Unknown", "percent_used": "0%",
                     "statfs": statfs(0, 0, 0, 0)}
                ]},
                {"id": 2, "lnn": 2, "count": 1, "partitions": [
                    {"mount_point": "/", "percent_used": "37%",
                     "statfs": statfs(1_000_000, 630_000, 500_000, 420_000)}
                ]}
            ]}),
        );

        self.add_response(
            ApiRequest::new("/platform/3/cluster/nodes/all/status"),
            json!({"nodes": [
                {"id": 1, "lnn": 1,
                 "batterystatus": {"result1": "passed", "result2": "passed", "status1": "Good"},
                 "powersupplies": {"count": 2, "supplies": [
                     {"id": 1, "name": "PS1", "good": "Good", "status": "Good"},
                     {"id": 2, "name": "PS2", "good": "Good", "status": "Good"}
                 ]}},
                {"id": 2, "lnn": 2,
                 "batterystatus": {"result1": "passed", "result2": "failed", "status1": "Good"},
                 "powersupplies": {"count": 2, "supplies": [
                     {"id": 1, "name": "PS1", "good": "Good", "status": "Good"},
                     {"id": 2, "name": "PS2", "good": "No", "status": "Failure: input voltage"}
                 ]}}
            ]}),
        );

        self.add_response(
            ApiRequest::new("/platform/3/cluster/nodes/all/drives"),
            json!({"nodes": [
                {"id": 1, "lnn": 1, "drives": [
                    {"baynum": 1, "devname": "da1", "media_type": "HDD",
                     "model": "ST4000NM0033", "interface_type": "SATA", "ui_state": "HEALTHY"},
                    {"baynum": 2, "devname": "da2", "media_type": "HDD",
                     "model": "ST4000NM0033", "interface_type": "SATA", "ui_state": "SMARTFAIL"}
                ]},
                {"id": 2, "lnn": 2, "drives": [
                    {"baynum": 1, "devname": "da1", "media_type": "SSD",
                     "model": "HUSMM1680ASS200", "interface_type": "SAS", "ui_state": "L3"},
                    {"baynum": 2, "devname": "da2", "media_type": "HDD",
                     "model": "ST4000NM0033", "interface_type": "SATA", "ui_state": "HEALTHY"}
                ]}
            ]}),
        );

        let hardware = |id: i64, serial: &str| {
            json!({
                "id": id, "lnn": id,
                "chassis": "X410 chassis", "chassis_code": "4U", "chassis_count": "1 of 1",
                "class": "storage", "cpu": "GenuineIntel E5-2630",
                "disk_controller": "LSI 2308 SAS", "disk_expander": "LSISAS2X36",
                "family_code": "X", "generation_code": "4",
                "hwgen": "Gen4 platform", "infiniband": "Mellanox ConnectX-3 QDR",
                "motherboard": "Intel S2600", "nvram": "NetList 2GB",
                "processor": "2,Intel Xeon E5-2630",
                "product": "X410-4U-Dual-64GB-2x1GE-2x10GE SFP+-34TB-800GB SSD",
                "serial_number": serial
            })
        };
        self.add_response(
            ApiRequest::new("/platform/3/cluster/nodes/all/hardware"),
            json!({"nodes": [hardware(1, "SX410-301608-0001"), hardware(2, "SX410-301608-0002")]}),
        );
    }

    fn add_data_services(&mut self) {
        self.add_response(
            ApiRequest::new("/platform/3/storagepool/storagepools"),
            json!({"total": 2, "storagepools": [
                {"name": "x410_pool", "manual": false, "type": "nodepool", "usage": {
                    "balanced": true,
                    "avail_bytes": "120000000000000", "avail_ssd_bytes": "400",
                    "free_bytes": "130000000000000", "free_ssd_bytes": "500",
                    "total_bytes": "200000000000000", "total_ssd_bytes": "1000",
                    "virtual_hot_spare_bytes": "4000000000000"
                }},
                {"name": "nl_tier", "manual": true, "type": "tier", "usage": {
                    "balanced": false,
                    "avail_bytes": "150000000000000", "avail_ssd_bytes": "0",
                    "free_bytes": "160000000000000", "free_ssd_bytes": "0",
                    "total_bytes": "300000000000000", "total_ssd_bytes": "",
                    "virtual_hot_spare_bytes": "0"
                }}
            ]}),
        );

        self.add_response(
            ApiRequest::new("/platform/3/sync/policies"),
            json!({"total": 2, "policies": [
                {"name": "home-dr", "enabled": true, "last_job_state": "finished",
                 "last_started": SCENARIO_NOW - 3600, "last_success": SCENARIO_NOW - 3000,
                 "priority": 1, "workers_per_node": 3,
                 "source_root_path": "/ifs/home", "target_host": "dr-cluster",
                 "target_path": "/ifs/home"},
                {"name": "archive", "enabled": false, "last_job_state": "failed",
                 "last_started": SCENARIO_NOW - 7200, "last_success": null,
                 "priority": 0, "workers_per_node": 1,
                 "source_root_path": "/ifs/archive", "target_host": "dr-cluster",
                 "target_path": "/ifs/archive"}
            ]}),
        );

        self.add_response(
            ApiRequest::new("/platform/1/snapshot/snapshots-summary"),
            json!({"summary": {
                "count": 3, "size": 3_221_225_472_u64,
                "active_count": 3, "active_size": 3_221_225_472_u64,
                "deleting_count": 0, "deleting_size": 0,
                "shadow_bytes": 0, "aliases_count": 1
            }}),
        );
        self.add_response(
            ApiRequest::new("/platform/1/snapshot/snapshots"),
            json!({"resume": "snap-page-2", "total": 3, "snapshots": [
                {"id": 101, "name": "daily-home", "created": SCENARIO_NOW - DAY, "path": "/ifs/home"},
                {"id": 87, "name": "weekly-home", "created": SCENARIO_NOW - 10 * DAY, "path": "/ifs/home"}
            ]}),
        );
        self.add_response(
            ApiRequest::new("/platform/1/snapshot/snapshots").param("resume", "snap-page-2"),
            json!({"resume": null, "snapshots": [
                {"id": 42, "name": "monthly-archive", "created": SCENARIO_NOW - 40 * DAY, "path": "/ifs/archive"}
            ]}),
        );

        self.add_response(
            ApiRequest::new("/platform/2/protocols/nfs/exports-summary"),
            json!({"summary": {"count": 12}}),
        );
        self.add_response(
            ApiRequest::new("/platform/3/protocols/smb/shares-summary"),
            json!({"summary": {"count": 5}}),
        );
    }

    fn add_quotas(&mut self) {
        self.add_response(
            ApiRequest::new("/platform/1/quota/quotas-summary"),
            json!({"summary": {
                "count": 4, "default_group_quotas_count": 0, "default_user_quotas_count": 0,
                "directory_quotas_count": 2, "group_quotas_count": 1,
                "linked_quotas_count": 0, "user_quotas_count": 1
            }}),
        );

        let first = QuotaQuery::First {
            kind: QuotaType::All,
            exceeded_only: false,
        };
        self.add_response(
            first.request(),
            json!({"resume": "quota-page-2", "quotas": [
                quota("AAAA", "/ifs/home", "directory", Value::Null, 7_500_000_000.0),
                quota("AAAB", "/ifs/archive", "directory", Value::Null, 2_000_000_000.0)
            ]}),
        );
        self.add_response(
            QuotaQuery::Resume("quota-page-2".into()).request(),
            json!({"resume": "", "quotas": [
                quota("AAAC", "/ifs/home", "user",
                      json!({"id": "UID:2001", "name": "jdoe", "type": "user"}), 900_000_000.0),
                quota("AAAD", "/ifs/home", "group",
                      json!({"id": "GID:3000", "name": "engineering", "type": "group"}), 1_200_000_000.0)
            ]}),
        );
    }

    fn add_protocols(&mut self) {
        self.add_stat(
            "node.protostats.nfs3",
            json!([
                {"devid": 1, "value": [op("read", "read", 120.0, 7200.0), op("write", "write", 80.0, 4800.0)]},
                {"devid": 2, "value": [op("read", "read", 60.0, 3600.0)]}
            ]),
        );
        self.add_stat(
            "node.protostats.nfs3.total",
            json!([
                {"devid": 1, "value": [total(200.0, 410.0)]},
                {"devid": 2, "value": [total(60.0, 390.0)]}
            ]),
        );
        self.add_stat(
            "node.protostats.smb2",
            json!([
                {"devid": 1, "value": [op("create", "create", 30.0, 1800.0)]},
                {"devid": 2, "value": [op("read", "read", 45.0, 2700.0)]}
            ]),
        );
        self.add_stat(
            "node.protostats.smb2.total",
            json!([
                {"devid": 1, "value": [total(30.0, 700.0)]},
                {"devid": 2, "value": [total(45.0, 850.5)]}
            ]),
        );
        // papi is enabled by default but idle: null value
        self.add_stat(
            "node.protostats.papi",
            json!([{"devid": 1, "value": null}, {"devid": 2, "value": null}]),
        );
        self.add_stat("node.clientstats.active.nfs3", nodes(4.0, 2.0));
        self.add_stat("node.clientstats.active.smb2", nodes(7.0, 9.0));
        self.add_stat("node.clientstats.connected.nfs", nodes(40.0, 22.0));
        self.add_stat("node.clientstats.connected.smb", nodes(25.0, 31.0));

        self.add_stat(
            "cluster.protostats.nfs3",
            json!([{"devid": 0, "value": [
                op("read", "read", 180.0, 10800.0),
                op("write", "write", 90.0, 5400.0)
            ]}]),
        );
        self.add_stat(
            "cluster.protostats.nfs3.total",
            json!([{"devid": 0, "value": [total(270.0, 405.0)]}]),
        );
        self.add_stat(
            "cluster.protostats.smb2",
            json!([{"devid": 0, "value": [op("read", "read", 310.0, 18600.0)]}]),
        );
        self.add_stat(
            "cluster.protostats.smb2.total",
            json!([{"devid": 0, "value": [total(310.0, 780.0)]}]),
        );
    }
}

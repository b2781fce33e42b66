//! Helpers shared by the satellite integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use drover_core::keys::{ResourceKey, SnapshotKey, StorPoolKey};
use drover_core::tx::NoopTransactionMgr;
use drover_proto::flags::{
    DrbdRscFlags, IgnoreReasons, NodeFlags, RscDfnFlags, RscFlags, SnapshotDfnFlags,
    SnapshotFlags, StorPoolDfnFlags, VlmDfnFlags, VlmFlags,
};
use drover_proto::kind::{LayerKind, NodeType, ProviderKind, TransportType};
use drover_proto::layer::{
    DrbdRscDfnPojo, DrbdRscPojo, DrbdVlmDfnPojo, DrbdVlmPojo, LayerDataPojo, LuksVlmPojo,
    RscLayerPojo, StorageVlmPojo, VlmStatePojo,
};
use drover_proto::name::{
    LayerId, NodeName, ResourceName, RscSuffix, SnapshotName, StorPoolName, VolumeNumber,
};
use drover_proto::pojo::{
    FullSyncData, NodePojo, OtherRscPojo, PropsMap, RscDfnPojo, RscInstancePojo, RscPojo,
    SnapshotDfnPojo, SnapshotPojo, SnapshotVlmDfnPojo, SnapshotVlmPojo, StorPoolPojo, VlmDfnPojo,
    VlmPojo,
};
use drover_proto::{ApplyData, AuthRequest, StateChange};
use drover_stlt::{DeviceManager, StltConfig, StltState, UpdateSequencer};

pub const LOCAL: &str = "alpha";

/// One device-manager notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    FullSync(NodeName),
    Nodes(BTreeSet<NodeName>),
    Rscs(BTreeSet<ResourceKey>),
    StorPools(BTreeSet<StorPoolKey>),
    Snapshots(BTreeSet<SnapshotKey>),
    Ctrl,
    ForceWake,
}

/// Device manager that records every notification in call order.
#[derive(Debug, Default)]
pub struct RecordingDeviceManager {
    events: Mutex<Vec<Event>>,
}

impl RecordingDeviceManager {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl DeviceManager for RecordingDeviceManager {
    fn full_sync_applied(&self, local_node: &NodeName) {
        self.push(Event::FullSync(local_node.clone()));
    }

    fn node_update_applied(&self, nodes: &BTreeSet<NodeName>) {
        self.push(Event::Nodes(nodes.clone()));
    }

    fn rsc_update_applied(&self, rscs: &BTreeSet<ResourceKey>) {
        self.push(Event::Rscs(rscs.clone()));
    }

    fn stor_pool_update_applied(&self, pools: &BTreeSet<StorPoolKey>) {
        self.push(Event::StorPools(pools.clone()));
    }

    fn snapshot_update_applied(&self, snapshots: &BTreeSet<SnapshotKey>) {
        self.push(Event::Snapshots(snapshots.clone()));
    }

    fn controller_update_applied(&self) {
        self.push(Event::Ctrl);
    }

    fn force_wake_update_notifications(&self) {
        self.push(Event::ForceWake);
    }
}

pub fn make_sequencer() -> (Arc<UpdateSequencer>, Arc<RecordingDeviceManager>) {
    let devmgr = Arc::new(RecordingDeviceManager::default());
    let stlt = StltState::new(
        StltConfig::default(),
        devmgr.clone(),
        Arc::new(NoopTransactionMgr),
    );
    (Arc::new(UpdateSequencer::new(Arc::new(stlt))), devmgr)
}

pub fn auth_request(full_sync_id: u64) -> AuthRequest {
    AuthRequest {
        node_uuid: uid(&format!("node:{}", LOCAL)),
        node_name: nname(LOCAL),
        ctrl_uuid: uid("controller"),
        full_sync_id,
    }
}

pub fn nname(s: &str) -> NodeName {
    NodeName::new(s).unwrap()
}

pub fn rname(s: &str) -> ResourceName {
    ResourceName::new(s).unwrap()
}

pub fn snapname(s: &str) -> SnapshotName {
    SnapshotName::new(s).unwrap()
}

pub fn spname(s: &str) -> StorPoolName {
    StorPoolName::new(s).unwrap()
}

pub fn vnr(nr: u32) -> VolumeNumber {
    VolumeNumber::new(nr).unwrap()
}

/// Deterministic uuid derived from a label.
pub fn uid(label: &str) -> Uuid {
    let mut n: u128 = 0x6c62_272e_07bb_0142;
    for b in label.bytes() {
        n = n.wrapping_mul(0x0100_0000_01b3).wrapping_add(b as u128);
    }
    Uuid::from_u128(n)
}

pub fn make_node(name: &str) -> NodePojo {
    NodePojo {
        uuid: uid(&format!("node:{}", name)),
        name: nname(name),
        node_type: NodeType::Satellite,
        flags: NodeFlags::empty(),
        props: PropsMap::new(),
    }
}

pub fn make_stor_pool(node: &str, pool: &str, provider: ProviderKind) -> StorPoolPojo {
    let mut props = PropsMap::new();
    props.insert("StorDriver/LvmVg".to_string(), format!("vg_{}", pool));
    let mut dfn_props = PropsMap::new();
    dfn_props.insert("Aux/site".to_string(), "rack1".to_string());
    StorPoolPojo {
        uuid: uid(&format!("sp:{}:{}", node, pool)),
        name: spname(pool),
        node_name: nname(node),
        dfn_uuid: uid(&format!("spdfn:{}", pool)),
        dfn_flags: StorPoolDfnFlags::empty(),
        provider_kind: provider,
        free_space_mgr_name: format!("{}:{}", node, pool),
        external_locking: false,
        props,
        dfn_props,
    }
}

pub fn make_rsc_dfn(rsc: &str, vlms: &[u32]) -> RscDfnPojo {
    RscDfnPojo {
        uuid: uid(&format!("rscdfn:{}", rsc)),
        name: rname(rsc),
        flags: RscDfnFlags::empty(),
        props: PropsMap::new(),
        layer_stack: vec![LayerKind::Drbd, LayerKind::Storage],
        external_name: None,
        rsc_grp_name: "DfltRscGrp".into(),
        vlm_dfns: vlms
            .iter()
            .map(|nr| VlmDfnPojo {
                uuid: uid(&format!("vlmdfn:{}:{}", rsc, nr)),
                vlm_nr: vnr(*nr),
                size_kib: 1 << 20,
                flags: VlmDfnFlags::empty(),
                props: PropsMap::new(),
            })
            .collect(),
    }
}

/// DRBD over STORAGE for one replica; layer ids start at `first_id`.
pub fn drbd_over_storage_pojo(
    node: &str,
    node_id: u16,
    pool: &str,
    vlms: &[u32],
    first_id: u32,
) -> RscLayerPojo {
    let storage = RscLayerPojo {
        id: LayerId(first_id + 1),
        suffix: RscSuffix::data(),
        suspend_io: false,
        ignore_reasons: IgnoreReasons::empty(),
        data: LayerDataPojo::Storage {
            vlms: vlms
                .iter()
                .map(|nr| StorageVlmPojo {
                    vlm_nr: vnr(*nr),
                    provider_kind: ProviderKind::Lvm,
                    stor_pool: make_stor_pool(node, pool, ProviderKind::Lvm),
                    state: VlmStatePojo {
                        allocated_size: Some(1 << 20),
                        usable_size: Some(1 << 20),
                        device_path: None,
                    },
                })
                .collect(),
        },
        children: Vec::new(),
    };
    RscLayerPojo {
        id: LayerId(first_id),
        suffix: RscSuffix::data(),
        suspend_io: false,
        ignore_reasons: IgnoreReasons::empty(),
        data: LayerDataPojo::Drbd {
            rsc: DrbdRscPojo {
                node_id,
                ports: vec![7000],
                port_count: 1,
                peer_slots: 7,
                al_stripes: 1,
                al_stripe_size: 32,
                flags: DrbdRscFlags::empty(),
                dfn: DrbdRscDfnPojo {
                    suffix: RscSuffix::data(),
                    peer_slots: 7,
                    al_stripes: 1,
                    al_stripe_size: 32,
                    transport_type: TransportType::Ip,
                    secret: Some("s3cret".into()),
                },
            },
            vlms: vlms
                .iter()
                .map(|nr| DrbdVlmPojo {
                    vlm_nr: vnr(*nr),
                    ext_meta_stor_pool: None,
                    vlm_dfn: DrbdVlmDfnPojo {
                        suffix: RscSuffix::data(),
                        minor_nr: Some(1000 + nr),
                    },
                    state: VlmStatePojo::default(),
                })
                .collect(),
        },
        children: vec![storage],
    }
}

/// LUKS over one LVM volume in `pool`; layer ids start at 1.
pub fn luks_over_storage_pojo(node: &str, pool: &str, password: &[u8]) -> RscLayerPojo {
    let mut storage = drbd_over_storage_pojo(node, 0, pool, &[0], 1).children.remove(0);
    storage.id = LayerId(2);
    RscLayerPojo {
        id: LayerId(1),
        suffix: RscSuffix::data(),
        suspend_io: false,
        ignore_reasons: IgnoreReasons::empty(),
        data: LayerDataPojo::Luks {
            vlms: vec![LuksVlmPojo {
                vlm_nr: vnr(0),
                encrypted_password: password.to_vec(),
                modify_password: None,
                state: VlmStatePojo::default(),
            }],
        },
        children: vec![storage],
    }
}

fn make_instance(node: &str, rsc: &str, vlms: &[u32], layer: RscLayerPojo) -> RscInstancePojo {
    RscInstancePojo {
        uuid: uid(&format!("rsc:{}:{}", node, rsc)),
        node_name: nname(node),
        flags: RscFlags::empty(),
        props: PropsMap::new(),
        vlms: vlms
            .iter()
            .map(|nr| VlmPojo {
                uuid: uid(&format!("vlm:{}:{}:{}", node, rsc, nr)),
                vlm_nr: vnr(*nr),
                vlm_dfn_uuid: uid(&format!("vlmdfn:{}:{}", rsc, nr)),
                flags: VlmFlags::empty(),
                props: PropsMap::new(),
            })
            .collect(),
        layer: Some(layer),
    }
}

/// Resource `rsc` on the local node, DRBD over one LVM volume in "pool1".
pub fn make_local_rsc(rsc: &str) -> RscPojo {
    RscPojo {
        rsc_dfn: make_rsc_dfn(rsc, &[0]),
        local: make_instance(LOCAL, rsc, &[0], drbd_over_storage_pojo(LOCAL, 0, "pool1", &[0], 1)),
        others: Vec::new(),
    }
}

/// Resource `rsc` on the local node, LUKS over one LVM volume in "pool1".
pub fn make_local_luks_rsc(rsc: &str) -> RscPojo {
    let mut rsc_dfn = make_rsc_dfn(rsc, &[0]);
    rsc_dfn.layer_stack = vec![LayerKind::Luks, LayerKind::Storage];
    RscPojo {
        rsc_dfn,
        local: make_instance(LOCAL, rsc, &[0], luks_over_storage_pojo(LOCAL, "pool1", b"enc")),
        others: Vec::new(),
    }
}

/// Add a replica on `peer` whose storage lives in `pool`.
pub fn add_peer(pojo: &mut RscPojo, peer: &str, pool: &str) {
    let rsc = pojo.rsc_dfn.name.as_str().to_string();
    let node_id = pojo.others.len() as u16 + 1;
    let first_id = 10 * (node_id as u32 + 1);
    pojo.others.push(OtherRscPojo {
        node: make_node(peer),
        rsc: make_instance(
            peer,
            &rsc,
            &[0],
            drbd_over_storage_pojo(peer, node_id, pool, &[0], first_id),
        ),
    });
}

/// Full sync of the local node with pool "pool1" and the given resources.
pub fn make_full_sync(full_sync_id: u64, rscs: Vec<RscPojo>) -> ApplyData {
    let data = FullSyncData {
        nodes: vec![make_node(LOCAL)],
        stor_pools: vec![make_stor_pool(LOCAL, "pool1", ProviderKind::Lvm)],
        rscs,
        ..FullSyncData::default()
    };
    ApplyData::new(full_sync_id, 0, StateChange::FullSync(Box::new(data)))
}

pub fn rsc_update(full_sync_id: u64, update_id: u64, pojo: RscPojo) -> ApplyData {
    ApplyData::new(full_sync_id, update_id, StateChange::Resource(Box::new(pojo)))
}

pub fn node_update(full_sync_id: u64, update_id: u64, node: &str) -> ApplyData {
    ApplyData::new(full_sync_id, update_id, StateChange::Node(make_node(node)))
}

/// Local snapshot `snap` of `rsc`, DRBD over one LVM volume in "pool1".
pub fn make_snapshot(rsc: &str, snap: &str) -> SnapshotPojo {
    SnapshotPojo {
        rsc_dfn: make_rsc_dfn(rsc, &[0]),
        snap_dfn: SnapshotDfnPojo {
            uuid: uid(&format!("snapdfn:{}:{}", rsc, snap)),
            name: snapname(snap),
            flags: SnapshotDfnFlags::SUCCESSFUL,
            props: PropsMap::new(),
            vlm_dfns: vec![SnapshotVlmDfnPojo {
                uuid: uid(&format!("snapvlmdfn:{}:{}:0", rsc, snap)),
                vlm_nr: vnr(0),
                size_kib: 1 << 20,
                props: PropsMap::new(),
            }],
        },
        uuid: uid(&format!("snap:{}:{}:{}", LOCAL, rsc, snap)),
        node_name: nname(LOCAL),
        flags: SnapshotFlags::empty(),
        props: PropsMap::new(),
        vlms: vec![SnapshotVlmPojo {
            uuid: uid(&format!("snapvlm:{}:{}:{}:0", LOCAL, rsc, snap)),
            vlm_nr: vnr(0),
            props: PropsMap::new(),
        }],
        layer: Some(drbd_over_storage_pojo(LOCAL, 0, "pool1", &[0], 1)),
    }
}

pub fn change(full_sync_id: u64, update_id: u64, change: StateChange) -> ApplyData {
    ApplyData::new(full_sync_id, update_id, change)
}

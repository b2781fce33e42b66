//! Test helpers shared by the unit tests of this crate.

use std::collections::BTreeMap;

use uuid::Uuid;

use drover_proto::flags::{
    DrbdRscFlags, IgnoreReasons, NodeFlags, RscDfnFlags, RscFlags, StorPoolDfnFlags, VlmDfnFlags,
    VlmFlags,
};
use drover_proto::kind::{LayerKind, NodeType, ProviderKind, TransportType};
use drover_proto::layer::{
    DrbdRscDfnPojo, DrbdRscPojo, DrbdVlmDfnPojo, DrbdVlmPojo, LayerDataPojo, LuksVlmPojo,
    NvmeVlmPojo, RscLayerPojo, StorageVlmPojo, VlmStatePojo, WritecacheVlmPojo,
};
use drover_proto::name::{
    LayerId, NodeName, ResourceName, RscSuffix, StorPoolName, VolumeNumber,
};
use drover_proto::pojo::{
    NodePojo, PropsMap, RscDfnPojo, RscInstancePojo, StorPoolPojo, VlmDfnPojo, VlmPojo,
};
use drover_proto::DrResult;

use crate::keys::{ResourceKey, StorPoolKey};
use crate::layer::LayerTree;
use crate::merge::merge_rsc_layers;
use crate::objects::{Node, Resource, ResourceDefinition, StoragePool, StorPoolDefinition};
use crate::world::{NodesMap, RscDfnMap, SatelliteConf, StorPoolDfnMap, WorldParts};

pub fn nname(s: &str) -> NodeName {
    NodeName::new(s).unwrap()
}

pub fn rname(s: &str) -> ResourceName {
    ResourceName::new(s).unwrap()
}

pub fn spname(s: &str) -> StorPoolName {
    StorPoolName::new(s).unwrap()
}

pub fn vnr(nr: u32) -> VolumeNumber {
    VolumeNumber::new(nr).unwrap()
}

/// Deterministic uuid derived from a label.
pub fn uid(label: &str) -> Uuid {
    let mut n: u128 = 0xcbf2_9ce4_8422_2325;
    for b in label.bytes() {
        n = n.wrapping_mul(0x0100_0000_01b3).wrapping_add(b as u128);
    }
    Uuid::from_u128(n)
}

pub fn props(pairs: &[(&str, &str)]) -> PropsMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn node_pojo(name: &str) -> NodePojo {
    NodePojo {
        uuid: uid(&format!("node:{}", name)),
        name: nname(name),
        node_type: NodeType::Satellite,
        flags: NodeFlags::empty(),
        props: PropsMap::new(),
    }
}

pub fn stor_pool_pojo(node: &str, pool: &str, provider: ProviderKind) -> StorPoolPojo {
    StorPoolPojo {
        uuid: uid(&format!("sp:{}:{}", node, pool)),
        name: spname(pool),
        node_name: nname(node),
        dfn_uuid: uid(&format!("spdfn:{}", pool)),
        dfn_flags: StorPoolDfnFlags::empty(),
        provider_kind: provider,
        free_space_mgr_name: format!("{}:{}", node, pool),
        external_locking: false,
        props: props(&[("pool-key", "pool-val")]),
        dfn_props: props(&[("dfn-key", "dfn-val")]),
    }
}

pub fn vlm_dfn_pojo(rsc: &str, nr: u32) -> VlmDfnPojo {
    VlmDfnPojo {
        uuid: uid(&format!("vlmdfn:{}:{}", rsc, nr)),
        vlm_nr: vnr(nr),
        size_kib: 1 << 20,
        flags: VlmDfnFlags::empty(),
        props: PropsMap::new(),
    }
}

pub fn rsc_dfn_pojo(rsc: &str, vlms: &[u32]) -> RscDfnPojo {
    RscDfnPojo {
        uuid: uid(&format!("rscdfn:{}", rsc)),
        name: rname(rsc),
        flags: RscDfnFlags::empty(),
        props: PropsMap::new(),
        layer_stack: vec![LayerKind::Drbd, LayerKind::Storage],
        external_name: None,
        rsc_grp_name: "DfltRscGrp".into(),
        vlm_dfns: vlms.iter().map(|nr| vlm_dfn_pojo(rsc, *nr)).collect(),
    }
}

pub fn rsc_instance_pojo(node: &str, rsc: &str, vlms: &[u32]) -> RscInstancePojo {
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
        layer: None,
    }
}

/// STORAGE object with one volume per number, all in pool "pool1" of `node`.
pub fn storage_pojo(node: &str, id: u32, vlms: &[u32], provider: ProviderKind) -> RscLayerPojo {
    RscLayerPojo {
        id: LayerId(id),
        suffix: RscSuffix::data(),
        suspend_io: false,
        ignore_reasons: IgnoreReasons::empty(),
        data: LayerDataPojo::Storage {
            vlms: vlms
                .iter()
                .map(|nr| StorageVlmPojo {
                    vlm_nr: vnr(*nr),
                    provider_kind: provider,
                    stor_pool: stor_pool_pojo(node, "pool1", provider),
                    state: VlmStatePojo {
                        allocated_size: Some(4096),
                        usable_size: Some(4000),
                        device_path: Some(format!("/dev/vg/r0_{:05}", nr)),
                    },
                })
                .collect(),
        },
        children: Vec::new(),
    }
}

fn layer_over_storage(node: &str, vlms: &[u32], data: LayerDataPojo) -> RscLayerPojo {
    RscLayerPojo {
        id: LayerId(1),
        suffix: RscSuffix::data(),
        suspend_io: false,
        ignore_reasons: IgnoreReasons::empty(),
        data,
        children: vec![storage_pojo(node, 2, vlms, ProviderKind::Lvm)],
    }
}

/// LUKS (id 1) over LVM STORAGE (id 2); every volume gets `password`.
pub fn luks_over_storage(node: &str, vlms: &[u32], password: &[u8]) -> RscLayerPojo {
    let vlms_pojo = vlms
        .iter()
        .map(|nr| LuksVlmPojo {
            vlm_nr: vnr(*nr),
            encrypted_password: password.to_vec(),
            modify_password: None,
            state: VlmStatePojo::default(),
        })
        .collect();
    layer_over_storage(node, vlms, LayerDataPojo::Luks { vlms: vlms_pojo })
}

/// NVME (id 1) over LVM STORAGE (id 2).
pub fn nvme_over_storage(node: &str, vlms: &[u32]) -> RscLayerPojo {
    let vlms_pojo = vlms
        .iter()
        .map(|nr| NvmeVlmPojo {
            vlm_nr: vnr(*nr),
            state: VlmStatePojo::default(),
        })
        .collect();
    layer_over_storage(node, vlms, LayerDataPojo::Nvme { vlms: vlms_pojo })
}

/// WRITECACHE (id 1) over LVM STORAGE (id 2), caching on `cache_pool`.
pub fn writecache_over_storage(node: &str, vlms: &[u32], cache_pool: Option<&str>) -> RscLayerPojo {
    let vlms_pojo = vlms
        .iter()
        .map(|nr| WritecacheVlmPojo {
            vlm_nr: vnr(*nr),
            cache_stor_pool: cache_pool.map(spname),
            state: VlmStatePojo::default(),
        })
        .collect();
    layer_over_storage(node, vlms, LayerDataPojo::Writecache { vlms: vlms_pojo })
}

/// DRBD (id 1) over STORAGE (id 2) with one storage volume per number, all
/// in pool "pool1" of `node`.
pub fn drbd_over_storage(node: &str, vlms: &[u32], provider: ProviderKind) -> RscLayerPojo {
    let storage = storage_pojo(node, 2, vlms, provider);
    RscLayerPojo {
        id: LayerId(1),
        suffix: RscSuffix::data(),
        suspend_io: false,
        ignore_reasons: IgnoreReasons::empty(),
        data: LayerDataPojo::Drbd {
            rsc: DrbdRscPojo {
                node_id: 0,
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

/// Shift every layer id of `pojo` by `offset`.
pub fn renumber(pojo: &mut RscLayerPojo, offset: u32) {
    pojo.id = LayerId(pojo.id.0 + offset);
    for child in &mut pojo.children {
        renumber(child, offset);
    }
}

pub fn set_drbd_flags(pojo: &mut RscLayerPojo, flags: DrbdRscFlags) {
    if let LayerDataPojo::Drbd { rsc, .. } = &mut pojo.data {
        rsc.flags = flags;
    }
}

pub fn set_storage_pool(pojo: &mut RscLayerPojo, pool: &str) {
    for child in &mut pojo.children {
        if let LayerDataPojo::Storage { vlms } = &mut child.data {
            for vlm in vlms {
                vlm.stor_pool.name = spname(pool);
                vlm.stor_pool.uuid = uid(&format!("sp:{}:{}", vlm.stor_pool.node_name, pool));
                vlm.stor_pool.dfn_uuid = uid(&format!("spdfn:{}", pool));
            }
        }
    }
}

/// Unlocked World-State Maps for exercising the builders directly.
pub struct TestWorld {
    pub conf: SatelliteConf,
    pub nodes: NodesMap,
    pub rsc_dfns: RscDfnMap,
    pub stor_pool_dfns: StorPoolDfnMap,
}

impl TestWorld {
    /// Node "alpha" with LVM pool "pool1" and resource "r0" with the given
    /// volumes on it.
    pub fn with_local_rsc(vlms: &[u32]) -> Self {
        let mut w = TestWorld {
            conf: SatelliteConf {
                local_node: Some(nname("alpha")),
                ..SatelliteConf::default()
            },
            nodes: BTreeMap::new(),
            rsc_dfns: BTreeMap::new(),
            stor_pool_dfns: BTreeMap::new(),
        };
        w.nodes
            .insert(nname("alpha"), Node::from_pojo(&node_pojo("alpha")));
        w.add_local_pool("pool1", ProviderKind::Lvm);

        let dfn_pojo = rsc_dfn_pojo("r0", vlms);
        let mut dfn = ResourceDefinition::from_pojo(&dfn_pojo);
        dfn.merge_vlm_dfns(&dfn_pojo.vlm_dfns).unwrap();
        w.rsc_dfns.insert(rname("r0"), dfn);
        w.add_rsc("alpha", vlms);
        w
    }

    pub fn add_local_pool(&mut self, pool: &str, provider: ProviderKind) {
        let pojo = stor_pool_pojo("alpha", pool, provider);
        self.stor_pool_dfns
            .entry(spname(pool))
            .or_insert_with(|| StorPoolDefinition::from_pojo(&pojo));
        self.nodes
            .get_mut(&nname("alpha"))
            .unwrap()
            .stor_pools
            .insert(spname(pool), StoragePool::from_pojo(&pojo));
    }

    /// Peer node with a replica of "r0" but no known storage pools.
    pub fn add_peer(&mut self, node: &str, vlms: &[u32]) {
        self.nodes.insert(nname(node), Node::from_pojo(&node_pojo(node)));
        self.add_rsc(node, vlms);
    }

    fn add_rsc(&mut self, node: &str, vlms: &[u32]) {
        let dfn = self.rsc_dfns.get_mut(&rname("r0")).unwrap();
        let inst = rsc_instance_pojo(node, "r0", vlms);
        let mut rsc = Resource::from_pojo(&rname("r0"), &inst);
        rsc.merge_volumes(&dfn.vlm_dfns, &inst.vlms).unwrap();
        dfn.resources.insert(nname(node), rsc);
    }

    pub fn parts(&mut self) -> WorldParts<'_> {
        WorldParts {
            conf: &self.conf,
            nodes: &mut self.nodes,
            rsc_dfns: &mut self.rsc_dfns,
            stor_pool_dfns: &mut self.stor_pool_dfns,
        }
    }

    pub fn merge(
        &mut self,
        node: &str,
        pojo: &RscLayerPojo,
        remote: bool,
    ) -> DrResult<Vec<StorPoolKey>> {
        let key = ResourceKey::new(nname(node), rname("r0"));
        merge_rsc_layers(&mut self.parts(), &key, pojo, remote)
    }

    pub fn tree(&self, node: &str) -> &LayerTree {
        &self.rsc_dfns[&rname("r0")].resources[&nname(node)].layer_tree
    }

    /// Fill the decrypted-password cache of LUKS object 1 on `node`.
    pub fn cache_luks_password(&mut self, node: &str, nr: u32, password: &[u8]) {
        let obj = self.tree_mut(node).get_mut(LayerId(1)).unwrap();
        let vlm = obj.data.luks_vlms_mut().unwrap().get_mut(vnr(nr)).unwrap();
        vlm.decrypted_password = Some(password.to_vec());
    }

    pub fn tree_mut(&mut self, node: &str) -> &mut LayerTree {
        &mut self
            .rsc_dfns
            .get_mut(&rname("r0"))
            .unwrap()
            .resources
            .get_mut(&nname(node))
            .unwrap()
            .layer_tree
    }
}

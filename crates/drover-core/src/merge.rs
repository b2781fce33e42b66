//! Wire-path layer tree merge.
//!
//! Merges a nested [`RscLayerPojo`] into the arena tree of a resource or
//! snapshot, depth first. Existing objects are found by id and updated in
//! place; missing ones are created with the description as parent link.
//! Volume-layer objects absent from the description are removed.
//!
//! Storage pools referenced by storage volumes are resolved through a
//! [`StorPoolResolver`]. A pool unknown to this satellite is materialized
//! when it belongs to a peer's replica, and is a fatal inconsistency when it
//! belongs to a local volume.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use drover_proto::kind::LayerKind;
use drover_proto::layer::{DrbdRscDfnPojo, DrbdVlmDfnPojo, LayerDataPojo, RscLayerPojo};
use drover_proto::name::{LayerId, NodeName, StorPoolName, VolumeNumber};
use drover_proto::pojo::StorPoolPojo;
use drover_proto::{DrError, DrResult};

use crate::keys::{ResourceKey, SnapshotKey, StorPoolKey};
use crate::layer::{
    check_tree, DrbdRscData, DrbdRscDfnData, DrbdVlmData, DrbdVlmDfnData, LayerTree, LayerVlms,
    LuksVlmData, NvmeVlmData, RscDfnLayerData, RscDfnLayerMap, RscLayerData, RscLayerObject,
    StorageVlmData, VlmCommon, VlmDfnLayerData, VlmDfnLayerMap, WritecacheVlmData,
};
use crate::objects::{
    check_uuid, ResourceDefinition, SnapshotDefinition, SnapshotVolumeDefinition, StoragePool,
    StorPoolDefinition, VolumeDefinition,
};
use crate::world::{NodesMap, StorPoolDfnMap, WorldParts};

/// Access to the definition-level layer data of the owner's definition.
pub trait DfnLayerStore {
    fn rsc_dfn_data(&mut self) -> &mut RscDfnLayerMap;

    /// Layer data of one volume definition. Fails when the definition does
    /// not exist.
    fn vlm_dfn_data(&mut self, vlm_nr: VolumeNumber) -> DrResult<&mut VlmDfnLayerMap>;
}

/// Definition-level layer data of a resource definition.
pub struct RscDfnLayers<'a> {
    pub layer_data: &'a mut RscDfnLayerMap,
    pub vlm_dfns: &'a mut BTreeMap<VolumeNumber, VolumeDefinition>,
}

impl DfnLayerStore for RscDfnLayers<'_> {
    fn rsc_dfn_data(&mut self) -> &mut RscDfnLayerMap {
        self.layer_data
    }

    fn vlm_dfn_data(&mut self, vlm_nr: VolumeNumber) -> DrResult<&mut VlmDfnLayerMap> {
        self.vlm_dfns
            .get_mut(&vlm_nr)
            .map(|vlm_dfn| &mut vlm_dfn.layer_data)
            .ok_or_else(|| {
                DrError::implementation(format!("volume definition {} missing", vlm_nr))
            })
    }
}

/// Definition-level layer data of a snapshot definition.
pub struct SnapDfnLayers<'a> {
    pub layer_data: &'a mut RscDfnLayerMap,
    pub vlm_dfns: &'a mut BTreeMap<VolumeNumber, SnapshotVolumeDefinition>,
}

impl DfnLayerStore for SnapDfnLayers<'_> {
    fn rsc_dfn_data(&mut self) -> &mut RscDfnLayerMap {
        self.layer_data
    }

    fn vlm_dfn_data(&mut self, vlm_nr: VolumeNumber) -> DrResult<&mut VlmDfnLayerMap> {
        self.vlm_dfns
            .get_mut(&vlm_nr)
            .map(|vlm_dfn| &mut vlm_dfn.layer_data)
            .ok_or_else(|| {
                DrError::implementation(format!("snapshot volume definition {} missing", vlm_nr))
            })
    }
}

/// Finds storage pools and creates pools of peer nodes on first sight.
pub trait StorPoolResolver {
    fn exists(&self, node: &NodeName, pool: &StorPoolName) -> bool;

    /// Register `pojo`'s pool (and its definition, if needed).
    fn materialize(&mut self, pojo: &StorPoolPojo) -> DrResult<()>;
}

/// [`StorPoolResolver`] backed by the World-State Maps.
pub struct WorldStorPoolResolver<'a> {
    nodes: &'a mut NodesMap,
    stor_pool_dfns: &'a mut StorPoolDfnMap,
    materialized: Vec<StorPoolKey>,
}

impl<'a> WorldStorPoolResolver<'a> {
    pub fn new(nodes: &'a mut NodesMap, stor_pool_dfns: &'a mut StorPoolDfnMap) -> Self {
        Self {
            nodes,
            stor_pool_dfns,
            materialized: Vec::new(),
        }
    }

    /// Pools created by this resolver.
    pub fn into_materialized(self) -> Vec<StorPoolKey> {
        self.materialized
    }
}

impl StorPoolResolver for WorldStorPoolResolver<'_> {
    fn exists(&self, node: &NodeName, pool: &StorPoolName) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|n| n.stor_pools.contains_key(pool))
    }

    fn materialize(&mut self, pojo: &StorPoolPojo) -> DrResult<()> {
        match self.stor_pool_dfns.get(&pojo.name) {
            Some(dfn) => check_uuid(
                "storage pool definition",
                pojo.name.as_str(),
                dfn.uuid,
                pojo.dfn_uuid,
            )?,
            None => {
                self.stor_pool_dfns
                    .insert(pojo.name.clone(), StorPoolDefinition::from_pojo(pojo));
            }
        }

        let node = self.nodes.get_mut(&pojo.node_name).ok_or_else(|| {
            DrError::implementation(format!(
                "storage pool '{}' references unknown node '{}'",
                pojo.name, pojo.node_name
            ))
        })?;
        match node.stor_pools.get(&pojo.name) {
            Some(pool) => check_uuid("storage pool", pojo.name.as_str(), pool.uuid, pojo.uuid)?,
            None => {
                node.stor_pools
                    .insert(pojo.name.clone(), StoragePool::from_pojo(pojo));
                info!(
                    "materialized remote storage pool {} on node {} ({})",
                    pojo.name, pojo.node_name, pojo.provider_kind
                );
                self.materialized
                    .push(StorPoolKey::new(pojo.node_name.clone(), pojo.name.clone()));
            }
        }
        Ok(())
    }
}

/// Merges one wire description into one owner's tree.
pub struct LayerTreeMerger<'m> {
    remote: bool,
    owner_vlms: BTreeSet<VolumeNumber>,
    dfn: &'m mut dyn DfnLayerStore,
    pools: &'m mut dyn StorPoolResolver,
}

impl<'m> LayerTreeMerger<'m> {
    /// `owner_vlms` are the volume numbers the owning resource or snapshot
    /// has; volume descriptions for any other number are dropped.
    pub fn new(
        remote: bool,
        owner_vlms: BTreeSet<VolumeNumber>,
        dfn: &'m mut dyn DfnLayerStore,
        pools: &'m mut dyn StorPoolResolver,
    ) -> Self {
        Self {
            remote,
            owner_vlms,
            dfn,
            pools,
        }
    }

    pub fn merge(&mut self, tree: &mut LayerTree, pojo: &RscLayerPojo) -> DrResult<()> {
        self.merge_rsc(tree, pojo, None)?;
        check_tree(tree)
    }

    fn merge_rsc(
        &mut self,
        tree: &mut LayerTree,
        pojo: &RscLayerPojo,
        parent: Option<LayerId>,
    ) -> DrResult<()> {
        let owner = tree.owner().clone();
        let existing = match parent {
            None => match tree.root() {
                Some(root) if root != pojo.id => {
                    return Err(DrError::divergent(
                        "root layer object",
                        owner.to_string(),
                        root,
                        pojo.id,
                    ));
                }
                other => other,
            },
            Some(_) => tree.contains(pojo.id).then_some(pojo.id),
        };
        if let Some(obj) = existing.and_then(|id| tree.get(id)) {
            if obj.kind() != pojo.kind() {
                return Err(DrError::divergent(
                    format!("layer object {}", pojo.id),
                    owner.to_string(),
                    obj.kind(),
                    pojo.kind(),
                ));
            }
        }

        if let LayerDataPojo::Drbd { rsc, .. } = &pojo.data {
            self.merge_or_create_drbd_rsc_dfn(&rsc.dfn);
        }

        match existing {
            None => {
                let mut obj = RscLayerObject::new(
                    pojo.id,
                    pojo.suffix.clone(),
                    owner.clone(),
                    new_rsc_data(&pojo.data),
                );
                obj.suspend_io = pojo.suspend_io;
                obj.ignore_reasons.reset_to(pojo.ignore_reasons);
                tree.insert(obj, parent)?;
                debug!("created {} layer object {} for {}", pojo.kind(), pojo.id, owner);
            }
            Some(id) => {
                tree.set_parent(id, parent)?;
                if let Some(obj) = tree.get_mut(id) {
                    merge_rsc_attrs(obj, pojo);
                }
            }
        }

        self.merge_vlms(tree, pojo)?;

        for child in &pojo.children {
            self.merge_rsc(tree, child, Some(pojo.id))?;
        }
        Ok(())
    }

    fn merge_vlms(&mut self, tree: &mut LayerTree, pojo: &RscLayerPojo) -> DrResult<()> {
        let node = tree.owner().node().clone();
        let obj = tree.get_mut(pojo.id).ok_or_else(|| {
            DrError::implementation(format!("layer object {} vanished during merge", pojo.id))
        })?;

        match (&mut obj.data, &pojo.data) {
            (RscLayerData::Drbd(data), LayerDataPojo::Drbd { vlms, .. }) => {
                for vlm in vlms {
                    if self.drop_unowned(&mut data.vlms, vlm.vlm_nr) {
                        continue;
                    }
                    self.merge_or_create_drbd_vlm_dfn(vlm.vlm_nr, &vlm.vlm_dfn)?;
                    let ext_meta = self.local_pool(&node, vlm.ext_meta_stor_pool.as_ref());
                    match data.vlms.get_mut(vlm.vlm_nr) {
                        Some(existing) => existing.ext_meta_stor_pool = ext_meta,
                        None => {
                            data.vlms.insert(
                                vlm.vlm_nr,
                                DrbdVlmData {
                                    ext_meta_stor_pool: ext_meta,
                                    common: VlmCommon::default(),
                                },
                            );
                        }
                    }
                }
            }
            (RscLayerData::Luks(data), LayerDataPojo::Luks { vlms }) => {
                for vlm in vlms {
                    if self.drop_unowned(data, vlm.vlm_nr) {
                        continue;
                    }
                    match data.get_mut(vlm.vlm_nr) {
                        Some(existing) => {
                            if existing.encrypted_password != vlm.encrypted_password {
                                existing.encrypted_password = vlm.encrypted_password.clone();
                                existing.decrypted_password = None;
                            }
                            existing.modify_password = vlm.modify_password.clone();
                        }
                        None => {
                            data.insert(
                                vlm.vlm_nr,
                                LuksVlmData {
                                    encrypted_password: vlm.encrypted_password.clone(),
                                    modify_password: vlm.modify_password.clone(),
                                    decrypted_password: None,
                                    common: VlmCommon::default(),
                                },
                            );
                        }
                    }
                }
            }
            (RscLayerData::Nvme(data), LayerDataPojo::Nvme { vlms }) => {
                for vlm in vlms {
                    if self.drop_unowned(data, vlm.vlm_nr) {
                        continue;
                    }
                    if data.get(vlm.vlm_nr).is_none() {
                        data.insert(vlm.vlm_nr, NvmeVlmData::default());
                    }
                }
            }
            (RscLayerData::Storage(data), LayerDataPojo::Storage { vlms }) => {
                for vlm in vlms {
                    if self.drop_unowned(data, vlm.vlm_nr) {
                        continue;
                    }
                    let stor_pool = self.resolve_stor_pool(&node, &vlm.stor_pool)?;
                    match data.get_mut(vlm.vlm_nr) {
                        Some(existing) if existing.provider == vlm.provider_kind => {
                            existing.stor_pool = stor_pool;
                            if vlm.provider_kind.has_backing_storage() {
                                existing.common.usable_size = vlm.state.usable_size;
                            }
                        }
                        other => {
                            if let Some(old) = other {
                                debug!(
                                    "volume {} of layer object {} changed provider {} -> {}",
                                    vlm.vlm_nr, pojo.id, old.provider, vlm.provider_kind
                                );
                            }
                            data.insert(
                                vlm.vlm_nr,
                                StorageVlmData {
                                    provider: vlm.provider_kind,
                                    stor_pool,
                                    common: VlmCommon {
                                        usable_size: vlm.state.usable_size,
                                        ..VlmCommon::default()
                                    },
                                },
                            );
                        }
                    }
                }
            }
            (RscLayerData::Writecache(data), LayerDataPojo::Writecache { vlms }) => {
                for vlm in vlms {
                    if self.drop_unowned(data, vlm.vlm_nr) {
                        continue;
                    }
                    let cache = self.local_pool(&node, vlm.cache_stor_pool.as_ref());
                    match data.get_mut(vlm.vlm_nr) {
                        Some(existing) => existing.cache_stor_pool = cache,
                        None => {
                            data.insert(
                                vlm.vlm_nr,
                                WritecacheVlmData {
                                    cache_stor_pool: cache,
                                    common: VlmCommon::default(),
                                },
                            );
                        }
                    }
                }
            }
            (data, _) => {
                return Err(DrError::implementation(format!(
                    "{} description merged into {} layer object {}",
                    pojo.kind(),
                    data.kind(),
                    pojo.id
                )));
            }
        }

        let described = pojo.vlm_nrs();
        for nr in obj.data.vlm_nrs() {
            if !described.contains(&nr) {
                obj.data.remove_vlm(nr);
                debug!("removed volume {} from layer object {}", nr, pojo.id);
            }
        }
        Ok(())
    }

    /// Remove the volume-layer object of a volume the owner does not have.
    fn drop_unowned<V>(&self, vlms: &mut LayerVlms<V>, nr: VolumeNumber) -> bool {
        if self.owner_vlms.contains(&nr) {
            return false;
        }
        vlms.remove(nr);
        true
    }

    fn local_pool(&self, node: &NodeName, name: Option<&StorPoolName>) -> Option<StorPoolKey> {
        name.filter(|pool| self.pools.exists(node, pool))
            .map(|pool| StorPoolKey::new(node.clone(), pool.clone()))
    }

    fn resolve_stor_pool(&mut self, node: &NodeName, pojo: &StorPoolPojo) -> DrResult<StorPoolKey> {
        if &pojo.node_name != node {
            return Err(DrError::implementation(format!(
                "volume on node '{}' references storage pool '{}' of node '{}'",
                node, pojo.name, pojo.node_name
            )));
        }
        let key = StorPoolKey::new(node.clone(), pojo.name.clone());
        if self.pools.exists(node, &pojo.name) {
            return Ok(key);
        }
        if !self.remote {
            return Err(DrError::UnknownStoragePool {
                pool: pojo.name.to_string(),
                node: node.to_string(),
            });
        }
        self.pools.materialize(pojo)?;
        Ok(key)
    }

    fn merge_or_create_drbd_rsc_dfn(&mut self, pojo: &DrbdRscDfnPojo) {
        let key = (LayerKind::Drbd, pojo.suffix.clone());
        let map = self.dfn.rsc_dfn_data();
        match map.get_mut(&key) {
            Some(RscDfnLayerData::Drbd(data)) => {
                data.transport_type = pojo.transport_type;
                data.secret = pojo.secret.clone();
            }
            None => {
                map.insert(key, RscDfnLayerData::Drbd(DrbdRscDfnData::from(pojo)));
            }
        }
    }

    fn merge_or_create_drbd_vlm_dfn(
        &mut self,
        vlm_nr: VolumeNumber,
        pojo: &DrbdVlmDfnPojo,
    ) -> DrResult<()> {
        // nothing to merge once created
        self.dfn
            .vlm_dfn_data(vlm_nr)?
            .entry((LayerKind::Drbd, pojo.suffix.clone()))
            .or_insert_with(|| VlmDfnLayerData::Drbd(DrbdVlmDfnData::from_pojo(vlm_nr, pojo)));
        Ok(())
    }
}

fn new_rsc_data(pojo: &LayerDataPojo) -> RscLayerData {
    match pojo {
        LayerDataPojo::Drbd { rsc, .. } => RscLayerData::Drbd(DrbdRscData {
            node_id: rsc.node_id,
            ports: rsc.ports.clone(),
            port_count: rsc.port_count,
            peer_slots: rsc.peer_slots,
            al_stripes: rsc.al_stripes,
            al_stripe_size: rsc.al_stripe_size,
            flags: rsc.flags,
            vlms: LayerVlms::default(),
        }),
        LayerDataPojo::Luks { .. } => RscLayerData::Luks(LayerVlms::default()),
        LayerDataPojo::Nvme { .. } => RscLayerData::Nvme(LayerVlms::default()),
        LayerDataPojo::Storage { .. } => RscLayerData::Storage(LayerVlms::default()),
        LayerDataPojo::Writecache { .. } => RscLayerData::Writecache(LayerVlms::default()),
    }
}

fn merge_rsc_attrs(obj: &mut RscLayerObject, pojo: &RscLayerPojo) {
    obj.suspend_io = pojo.suspend_io;
    obj.ignore_reasons.reset_to(pojo.ignore_reasons);
    if let (RscLayerData::Drbd(data), LayerDataPojo::Drbd { rsc, .. }) = (&mut obj.data, &pojo.data)
    {
        data.flags.reset_to(rsc.flags);
        data.node_id = rsc.node_id;
        data.ports = rsc.ports.clone();
        data.port_count = rsc.port_count;
    }
}

/// Merge the layer description of a resource already present in `world`.
/// Returns the storage pools materialized along the way.
pub fn merge_rsc_layers(
    world: &mut WorldParts<'_>,
    key: &ResourceKey,
    pojo: &RscLayerPojo,
    remote: bool,
) -> DrResult<Vec<StorPoolKey>> {
    let ResourceDefinition {
        resources,
        layer_data,
        vlm_dfns,
        ..
    } = world
        .rsc_dfns
        .get_mut(&key.rsc)
        .ok_or_else(|| DrError::implementation(format!("resource definition {} missing", key.rsc)))?;
    let rsc = resources
        .get_mut(&key.node)
        .ok_or_else(|| DrError::implementation(format!("resource {} missing", key)))?;

    let owner_vlms = rsc.volumes.keys().copied().collect();
    let mut dfn = RscDfnLayers {
        layer_data,
        vlm_dfns,
    };
    let mut pools = WorldStorPoolResolver::new(&mut *world.nodes, &mut *world.stor_pool_dfns);
    LayerTreeMerger::new(remote, owner_vlms, &mut dfn, &mut pools).merge(&mut rsc.layer_tree, pojo)?;
    Ok(pools.into_materialized())
}

/// Merge the layer description of a local snapshot already present in
/// `world`.
pub fn merge_snapshot_layers(
    world: &mut WorldParts<'_>,
    key: &SnapshotKey,
    pojo: &RscLayerPojo,
) -> DrResult<()> {
    let rsc_dfn = world
        .rsc_dfns
        .get_mut(&key.rsc)
        .ok_or_else(|| DrError::implementation(format!("resource definition {} missing", key.rsc)))?;
    let SnapshotDefinition {
        snapshots,
        layer_data,
        vlm_dfns,
        ..
    } = rsc_dfn.snapshot_dfns.get_mut(&key.snap).ok_or_else(|| {
        DrError::implementation(format!("snapshot definition {}@{} missing", key.rsc, key.snap))
    })?;
    let snap = snapshots
        .get_mut(&key.node)
        .ok_or_else(|| DrError::implementation(format!("snapshot {} missing", key)))?;

    let owner_vlms = snap.volumes.keys().copied().collect();
    let mut dfn = SnapDfnLayers {
        layer_data,
        vlm_dfns,
    };
    let mut pools = WorldStorPoolResolver::new(&mut *world.nodes, &mut *world.stor_pool_dfns);
    LayerTreeMerger::new(false, owner_vlms, &mut dfn, &mut pools).merge(&mut snap.layer_tree, pojo)
}

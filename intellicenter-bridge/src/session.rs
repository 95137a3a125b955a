//! Configuration discovery for a freshly connected unit
//!
//! Runs strictly in sequence, each request awaited before the next is sent:
//! 1. System configuration: pool and spa bodies, chemistry controller
//! 2. Chemical status: chlorinator
//! 3. Circuit status: freeze protection and the tracked circuits
//! 4. One subscription per resolved object
//!
//! Subscription responses carry current values and are applied to the store
//! before the caller delivers the first snapshot.

use intellicenter_api::{keys, tags, ObjectEntry, Request, Result, UnitSession};
use intellicenter_state::{RoleMap, SnapshotStore};

const BODY_KEYS: &[&str] = &[keys::LOTMP, keys::HTSRC, keys::STATUS, keys::LSTTMP];
const CHLORINATOR_KEYS: &[&str] = &[keys::SALT];
const CHEMISTRY_KEYS: &[&str] = &[keys::PHVAL, keys::PHTNK, keys::ORPVAL, keys::QUALTY];
const CIRCUIT_KEYS: &[&str] = &[keys::STATUS];

/// Resolve roles, subscribe, and seed the store with current values.
///
/// Any failed request aborts the whole sequence; the caller tears the
/// session down and retries later.
pub async fn discover_configuration<S>(session: &S, store: &mut SnapshotStore) -> Result<RoleMap>
where
    S: UnitSession + ?Sized,
{
    tracing::info!("logged into unit. getting system configuration...");
    let hardware = session.request(Request::system_configuration()).await?;
    let mut roles = RoleMap::default();
    resolve_bodies(&hardware.answer, &mut roles);

    tracing::info!("getting chemical status...");
    let chemistry = session.request(Request::chemical_status()).await?;
    for object in &chemistry.object_list {
        if object.subtype() == Some(tags::ICHLOR) {
            roles.chlorinator = Some(object.objnam.clone());
        }
    }

    tracing::info!("getting circuit status...");
    let circuits = session.request(Request::circuit_status()).await?;
    let mut seeds: Vec<ObjectEntry> = Vec::new();
    let mut tracked: Vec<String> = Vec::new();
    for object in &circuits.object_list {
        if object.subtype() == Some(tags::FRZ) {
            roles.freeze = Some(object.objnam.clone());
            seeds.push(object.clone());
        } else if store.is_tracked(&object.objnam) {
            if let Some(name) = object.text(keys::SNAME).filter(|name| !name.is_empty()) {
                store.set_circuit_name(&object.objnam, name);
            }
            tracked.push(object.objnam.clone());
            seeds.push(object.clone());
        }
    }
    for id in store.snapshot().circuits.keys() {
        if !tracked.contains(id) {
            tracing::warn!("configured circuit {} was not found on the unit", id);
        }
    }

    store.begin_session(roles.clone());
    store.apply(&seeds);

    if let Some(freeze) = &roles.freeze {
        tracing::info!("registering for freeze protection updates...");
        subscribe(session, store, freeze, CIRCUIT_KEYS).await?;
    }
    for id in &tracked {
        tracing::info!("registering for circuit {} updates...", id);
        subscribe(session, store, id, CIRCUIT_KEYS).await?;
    }
    if let Some(pool) = &roles.pool {
        tracing::info!("registering for pool updates...");
        subscribe(session, store, pool, BODY_KEYS).await?;
    }
    if let Some(spa) = &roles.spa {
        tracing::info!("registering for spa updates...");
        subscribe(session, store, spa, BODY_KEYS).await?;
    }
    if let Some(chlorinator) = &roles.chlorinator {
        tracing::info!("registering for chlorinator updates...");
        subscribe(session, store, chlorinator, CHLORINATOR_KEYS).await?;
    }
    if let Some(chemistry) = &roles.chemistry {
        tracing::info!("registering for chemical updates...");
        subscribe(session, store, chemistry, CHEMISTRY_KEYS).await?;
    }

    tracing::info!("finished initial setup.");
    Ok(roles)
}

async fn subscribe<S>(session: &S, store: &mut SnapshotStore, objnam: &str, keys: &[&str]) -> Result<()>
where
    S: UnitSession + ?Sized,
{
    let response = session.request(Request::subscribe(objnam, keys)).await?;
    store.apply(&response.object_list);
    Ok(())
}

/// Walk the object tree; the last pool body found owns the chemistry controller
fn resolve_bodies(objects: &[ObjectEntry], roles: &mut RoleMap) {
    for object in objects {
        if object.is_type(tags::BODY, tags::POOL) {
            roles.pool = Some(object.objnam.clone());
            roles.chemistry = object
                .objects(keys::OBJLIST)
                .iter()
                .find(|child| child.subtype() == Some(tags::ICHEM))
                .map(|child| child.objnam.clone());
        } else if object.is_type(tags::BODY, tags::SPA) {
            roles.spa = Some(object.objnam.clone());
        }
        resolve_bodies(object.objects(keys::OBJLIST), roles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(objnam: &str, subtyp: &str) -> ObjectEntry {
        ObjectEntry::new(objnam)
            .with(keys::OBJTYP, tags::BODY)
            .with(keys::SUBTYP, subtyp)
    }

    #[test]
    fn test_resolve_nested_bodies() {
        let tree = vec![ObjectEntry::new("PNL01").with_objects(
            keys::OBJLIST,
            vec![
                body("B1101", tags::POOL).with_objects(
                    keys::OBJLIST,
                    vec![ObjectEntry::new("CHM01").with(keys::SUBTYP, tags::ICHEM)],
                ),
                body("B1202", tags::SPA),
            ],
        )];

        let mut roles = RoleMap::default();
        resolve_bodies(&tree, &mut roles);

        assert_eq!(roles.pool.as_deref(), Some("B1101"));
        assert_eq!(roles.spa.as_deref(), Some("B1202"));
        assert_eq!(roles.chemistry.as_deref(), Some("CHM01"));
    }

    #[test]
    fn test_chemistry_must_sit_under_the_pool() {
        let tree = vec![
            body("B1101", tags::POOL),
            body("B1202", tags::SPA).with_objects(
                keys::OBJLIST,
                vec![ObjectEntry::new("CHM01").with(keys::SUBTYP, tags::ICHEM)],
            ),
        ];

        let mut roles = RoleMap::default();
        resolve_bodies(&tree, &mut roles);

        assert_eq!(roles.pool.as_deref(), Some("B1101"));
        assert_eq!(roles.chemistry, None);
    }
}

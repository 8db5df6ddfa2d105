//! Node pool reconciliation.
//!
//! Pools get their ids from the server, so a declared pool usually has no
//! id on first apply. Declared pools are paired with observed pools by id
//! first, then by exact shape, then greedily by the smallest count
//! difference among pools of the same type. Whatever stays unpaired is
//! created or deleted.

use std::collections::BTreeMap;

use crate::error::{ReconcileError, Result};
use crate::linode::{
    LkeNodePool, LkeNodePoolAutoscaler, LkeNodePoolCreateOptions, LkeNodePoolUpdateOptions,
};

/// A declared node pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSpec {
    /// Server id, when the pool was already paired with one.
    pub id: Option<i64>,
    /// Instance type.
    pub pool_type: String,
    /// Declared node count; `0` when left to the autoscaler.
    pub count: i64,
    /// Autoscaler bounds `(min, max)` when enabled.
    pub autoscaler: Option<(i64, i64)>,
    /// Pool tags.
    pub tags: Vec<String>,
}

impl PoolSpec {
    /// Node count the pool should have: the declared count, or the
    /// autoscaler minimum when no count was declared.
    ///
    /// # Errors
    ///
    /// Returns a provider bug when neither is available.
    pub fn effective_count(&self) -> Result<i64> {
        match (self.count, self.autoscaler) {
            (0, Some((min, _))) => Ok(min),
            (0, None) => Err(ReconcileError::provider_bug(format!(
                "node pool of type {} has no count and no autoscaler.",
                self.pool_type
            ))
            .into()),
            (count, _) => Ok(count),
        }
    }

    fn autoscaler_settings(&self) -> Option<LkeNodePoolAutoscaler> {
        self.autoscaler.map(|(min, max)| LkeNodePoolAutoscaler {
            enabled: true,
            min,
            max,
        })
    }

    /// Returns true when `pool` already has this shape.
    fn matches(&self, pool: &LkeNodePool, count: i64) -> bool {
        self.pool_type == pool.pool_type
            && observed_autoscaler(pool) == self.autoscaler
            && (self.count == 0 || count == pool.count)
    }

    /// Create request for this pool with `count` nodes.
    #[must_use]
    pub fn create_options(&self, count: i64) -> LkeNodePoolCreateOptions {
        LkeNodePoolCreateOptions {
            count,
            pool_type: self.pool_type.clone(),
            autoscaler: self.autoscaler_settings(),
            tags: self.tags.clone(),
        }
    }

    /// Update bringing `pool` to this shape. The count is omitted when the
    /// autoscaler owns it; a disabled autoscaler is only sent to turn off an
    /// enabled one.
    fn update_options(&self, pool: &LkeNodePool) -> LkeNodePoolUpdateOptions {
        let autoscaler = match self.autoscaler_settings() {
            Some(settings) => Some(settings),
            None if pool.autoscaler.enabled => Some(LkeNodePoolAutoscaler {
                enabled: false,
                min: self.count,
                max: self.count,
            }),
            None => None,
        };
        LkeNodePoolUpdateOptions {
            count: (self.count != 0).then_some(self.count),
            autoscaler,
            tags: self.tags_differ(pool).then(|| self.tags.clone()),
        }
    }

    fn tags_differ(&self, pool: &LkeNodePool) -> bool {
        let mut declared = self.tags.clone();
        let mut observed = pool.tags.clone();
        declared.sort();
        observed.sort();
        declared != observed
    }
}

fn observed_autoscaler(pool: &LkeNodePool) -> Option<(i64, i64)> {
    pool.autoscaler
        .enabled
        .then_some((pool.autoscaler.min, pool.autoscaler.max))
}

/// Commands that turn the observed pools into the declared ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolUpdates {
    /// Pools to create.
    pub to_create: Vec<LkeNodePoolCreateOptions>,
    /// Pools to update in place, by id.
    pub to_update: BTreeMap<i64, LkeNodePoolUpdateOptions>,
    /// Pools to delete.
    pub to_delete: Vec<i64>,
}

impl PoolUpdates {
    /// Returns true when nothing has to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Computes the commands that reconcile `observed` with `declared`.
///
/// Pairing is by identity and shape, not position: first by known pool id,
/// then by an exact match of type and count, then greedily by the same type
/// with the smallest node-count difference. Reordering pools in the
/// configuration therefore never recreates them. Unpaired declared pools are
/// created and unpaired observed pools deleted.
///
/// # Errors
///
/// Returns a provider bug if a declared pool has neither a count nor an
/// autoscaler.
pub fn reconcile_pools(declared: &[PoolSpec], observed: &[LkeNodePool]) -> Result<PoolUpdates> {
    let counts = declared
        .iter()
        .map(PoolSpec::effective_count)
        .collect::<Result<Vec<_>>>()?;

    let mut updates = PoolUpdates::default();
    let mut spec_paired = vec![false; declared.len()];
    let mut pool_paired = vec![false; observed.len()];

    // Known ids.
    for (i, spec) in declared.iter().enumerate() {
        let Some(id) = spec.id else { continue };
        let Some(j) = (0..observed.len()).find(|&j| !pool_paired[j] && observed[j].id == id) else {
            continue;
        };
        spec_paired[i] = true;
        pool_paired[j] = true;

        let pool = &observed[j];
        if spec.pool_type != pool.pool_type {
            updates.to_delete.push(pool.id);
            updates.to_create.push(spec.create_options(counts[i]));
        } else if !spec.matches(pool, counts[i]) || spec.tags_differ(pool) {
            updates.to_update.insert(pool.id, spec.update_options(pool));
        }
    }

    // Exact shapes.
    for (i, spec) in declared.iter().enumerate() {
        if spec_paired[i] {
            continue;
        }
        if let Some(j) = (0..observed.len()).find(|&j| !pool_paired[j] && spec.matches(&observed[j], counts[i])) {
            spec_paired[i] = true;
            pool_paired[j] = true;
            if spec.tags_differ(&observed[j]) {
                let retag = LkeNodePoolUpdateOptions {
                    tags: Some(spec.tags.clone()),
                    ..LkeNodePoolUpdateOptions::default()
                };
                updates.to_update.insert(observed[j].id, retag);
            }
        }
    }

    // Same type, smallest resize first.
    let mut candidates = Vec::new();
    for (i, spec) in declared.iter().enumerate() {
        if spec_paired[i] {
            continue;
        }
        for (j, pool) in observed.iter().enumerate() {
            if !pool_paired[j] && pool.pool_type == spec.pool_type {
                candidates.push(((pool.count - counts[i]).abs(), i, j));
            }
        }
    }
    candidates.sort_unstable();

    for (_, i, j) in candidates {
        if spec_paired[i] || pool_paired[j] {
            continue;
        }
        spec_paired[i] = true;
        pool_paired[j] = true;
        updates
            .to_update
            .insert(observed[j].id, declared[i].update_options(&observed[j]));
    }

    for (i, spec) in declared.iter().enumerate() {
        if !spec_paired[i] {
            updates.to_create.push(spec.create_options(counts[i]));
        }
    }
    for (j, pool) in observed.iter().enumerate() {
        if !pool_paired[j] {
            updates.to_delete.push(pool.id);
        }
    }

    Ok(updates)
}

/// Orders observed pools like the declared ones: by id, then by type and
/// count. Pools nobody declared go last, in server order.
#[must_use]
pub fn order_pools_like_declared(declared: &[PoolSpec], observed: Vec<LkeNodePool>) -> Vec<LkeNodePool> {
    let mut remaining: Vec<Option<LkeNodePool>> = observed.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());

    for spec in declared {
        let slot = remaining.iter().position(|pool| {
            pool.as_ref().is_some_and(|pool| {
                spec.id == Some(pool.id)
                    || (spec.id.is_none() && spec.pool_type == pool.pool_type && spec.count == pool.count)
            })
        });
        if let Some(pool) = slot.and_then(|j| remaining[j].take()) {
            ordered.push(pool);
        }
    }

    ordered.extend(remaining.into_iter().flatten());
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(pool_type: &str, count: i64) -> PoolSpec {
        PoolSpec {
            pool_type: pool_type.to_string(),
            count,
            ..PoolSpec::default()
        }
    }

    fn pool(id: i64, pool_type: &str, count: i64) -> LkeNodePool {
        LkeNodePool {
            id,
            count,
            pool_type: pool_type.to_string(),
            nodes: Vec::new(),
            autoscaler: LkeNodePoolAutoscaler {
                enabled: false,
                min: count,
                max: count,
            },
            tags: Vec::new(),
        }
    }

    fn resize(count: i64) -> LkeNodePoolUpdateOptions {
        LkeNodePoolUpdateOptions {
            count: Some(count),
            ..LkeNodePoolUpdateOptions::default()
        }
    }

    /// Applies updates to `observed` the way the API would, returning the
    /// resulting `(type, count, autoscaler)` shapes sorted.
    fn apply(observed: &[LkeNodePool], updates: &PoolUpdates) -> Vec<(String, i64, Option<(i64, i64)>)> {
        let mut pools: Vec<LkeNodePool> = observed
            .iter()
            .filter(|p| !updates.to_delete.contains(&p.id))
            .cloned()
            .collect();
        for opts in &updates.to_create {
            let mut created = pool(0, &opts.pool_type, opts.count);
            if let Some(autoscaler) = opts.autoscaler {
                created.autoscaler = autoscaler;
            }
            pools.push(created);
        }
        for p in &mut pools {
            if let Some(opts) = updates.to_update.get(&p.id) {
                if let Some(count) = opts.count {
                    p.count = count;
                }
                if let Some(autoscaler) = opts.autoscaler {
                    p.autoscaler = autoscaler;
                }
            }
        }
        let mut shapes: Vec<_> = pools
            .iter()
            .map(|p| (p.pool_type.clone(), p.count, observed_autoscaler(p)))
            .collect();
        shapes.sort();
        shapes
    }

    fn declared_shapes(declared: &[PoolSpec]) -> Vec<(String, i64, Option<(i64, i64)>)> {
        let mut shapes: Vec<_> = declared
            .iter()
            .map(|s| (s.pool_type.clone(), s.effective_count().expect("count"), s.autoscaler))
            .collect();
        shapes.sort();
        shapes
    }

    #[test]
    fn test_no_change() {
        let updates = reconcile_pools(&[spec("X", 2)], &[pool(123, "X", 2)]).expect("reconcile");
        assert!(updates.is_empty());
    }

    #[test]
    fn test_upsize() {
        let updates = reconcile_pools(&[spec("X", 3)], &[pool(123, "X", 2)]).expect("reconcile");
        assert_eq!(updates.to_update, BTreeMap::from([(123, resize(3))]));
        assert!(updates.to_create.is_empty());
        assert!(updates.to_delete.is_empty());
    }

    #[test]
    fn test_type_change_replaces_pool() {
        let updates = reconcile_pools(&[spec("Y", 2)], &[pool(123, "X", 2)]).expect("reconcile");
        assert_eq!(updates.to_delete, vec![123]);
        assert_eq!(updates.to_create.len(), 1);
        assert_eq!(updates.to_create[0].pool_type, "Y");
        assert_eq!(updates.to_create[0].count, 2);
        assert!(updates.to_update.is_empty());
    }

    #[test]
    fn test_type_change_on_known_id() {
        let mut declared = spec("Y", 2);
        declared.id = Some(123);
        let updates = reconcile_pools(&[declared], &[pool(123, "X", 2)]).expect("reconcile");
        assert_eq!(updates.to_delete, vec![123]);
        assert_eq!(updates.to_create.len(), 1);
        assert!(updates.to_update.is_empty());
    }

    #[test]
    fn test_competing_resizes() {
        let declared = [spec("T", 2), spec("T", 9), spec("T", 8), spec("T", 2)];
        let observed = [
            pool(123, "T", 3),
            pool(124, "T", 7),
            pool(126, "T", 4),
            pool(127, "T", 2),
        ];
        let updates = reconcile_pools(&declared, &observed).expect("reconcile");
        assert_eq!(
            updates.to_update,
            BTreeMap::from([(123, resize(2)), (124, resize(8)), (126, resize(9))])
        );
        assert!(updates.to_create.is_empty());
        assert!(updates.to_delete.is_empty());
    }

    #[test]
    fn test_autoscaler_drop() {
        let mut observed = pool(123, "T", 3);
        observed.autoscaler = LkeNodePoolAutoscaler {
            enabled: true,
            min: 3,
            max: 7,
        };
        let updates = reconcile_pools(&[spec("T", 3)], &[observed]).expect("reconcile");
        assert_eq!(
            updates.to_update,
            BTreeMap::from([(
                123,
                LkeNodePoolUpdateOptions {
                    count: Some(3),
                    autoscaler: Some(LkeNodePoolAutoscaler {
                        enabled: false,
                        min: 3,
                        max: 3,
                    }),
                    tags: None,
                },
            )])
        );
    }

    #[test]
    fn test_autoscaler_owned_count_is_not_sent() {
        let mut declared = spec("T", 0);
        declared.autoscaler = Some((2, 6));
        let updates = reconcile_pools(&[declared], &[pool(123, "T", 4)]).expect("reconcile");
        let opts = updates.to_update.get(&123).expect("update");
        assert_eq!(opts.count, None);
        assert_eq!(
            opts.autoscaler,
            Some(LkeNodePoolAutoscaler {
                enabled: true,
                min: 2,
                max: 6,
            })
        );
    }

    #[test]
    fn test_autoscaled_pool_matches_any_count() {
        let mut declared = spec("T", 0);
        declared.autoscaler = Some((2, 6));
        let mut observed = pool(123, "T", 5);
        observed.autoscaler = LkeNodePoolAutoscaler {
            enabled: true,
            min: 2,
            max: 6,
        };
        assert!(reconcile_pools(&[declared], &[observed]).expect("reconcile").is_empty());
    }

    #[test]
    fn test_zero_count_without_autoscaler_is_a_provider_bug() {
        let err = reconcile_pools(&[spec("T", 0)], &[]).expect_err("bug");
        assert!(err.to_string().contains("provider issue"));
    }

    #[test]
    fn test_tag_change_only_retags() {
        let mut declared = spec("X", 2);
        declared.tags = vec![String::from("prod")];
        let updates = reconcile_pools(&[declared], &[pool(123, "X", 2)]).expect("reconcile");
        assert_eq!(
            updates.to_update.get(&123),
            Some(&LkeNodePoolUpdateOptions {
                tags: Some(vec![String::from("prod")]),
                ..LkeNodePoolUpdateOptions::default()
            })
        );
    }

    #[test]
    fn test_trailing_pools_created_and_deleted() {
        let updates = reconcile_pools(
            &[spec("X", 2)],
            &[pool(1, "X", 2), pool(2, "X", 2)],
        )
        .expect("reconcile");
        assert_eq!(updates.to_delete, vec![2]);

        let updates = reconcile_pools(&[spec("X", 2), spec("X", 5)], &[pool(1, "X", 2)]).expect("reconcile");
        assert_eq!(updates.to_create.len(), 1);
        assert_eq!(updates.to_create[0].count, 5);
    }

    #[test]
    fn test_converges_and_stays_disjoint() {
        let cases: Vec<(Vec<PoolSpec>, Vec<LkeNodePool>)> = vec![
            (vec![spec("A", 1), spec("B", 4)], vec![pool(1, "B", 2), pool(2, "C", 3)]),
            (
                vec![spec("A", 3), spec("A", 3), spec("A", 1)],
                vec![pool(1, "A", 1), pool(2, "A", 5)],
            ),
            (vec![], vec![pool(1, "A", 1)]),
            (vec![spec("A", 2), spec("B", 2)], vec![]),
            (
                vec![spec("T", 2), spec("T", 9), spec("T", 8), spec("T", 2)],
                vec![pool(123, "T", 3), pool(124, "T", 7), pool(126, "T", 4), pool(127, "T", 2)],
            ),
        ];

        for (declared, observed) in cases {
            let updates = reconcile_pools(&declared, &observed).expect("reconcile");
            for id in updates.to_update.keys() {
                assert!(!updates.to_delete.contains(id), "pool {id} both updated and deleted");
            }
            assert_eq!(apply(&observed, &updates), declared_shapes(&declared));
        }
    }

    #[test]
    fn test_order_pools_like_declared() {
        let mut by_id = spec("X", 9);
        by_id.id = Some(3);
        let declared = [spec("Y", 1), by_id];
        let observed = vec![pool(1, "Z", 1), pool(2, "Y", 1), pool(3, "X", 2)];

        let ordered: Vec<i64> = order_pools_like_declared(&declared, observed)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ordered, vec![2, 3, 1]);
    }
}

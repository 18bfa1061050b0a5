// Pure queries over a registry snapshot.
//
// Nothing here touches storage or Discord: callers pass in the registry they
// loaded and get plain values back. The registry is small (tens of nodes), so
// every lookup is a linear scan.

use super::graduation_models::{ExclusivityPlan, PromotionPlan, RegisteredRole, Tail};
use std::collections::HashSet;

/// Find a node by exact role id.
pub fn find_role(registry: &[RegisteredRole], role_id: u64) -> Option<&RegisteredRole> {
    registry.iter().find(|node| node.role_id == role_id)
}

/// Resolve the deepest node reachable from `start_id` through exclusive nodes only.
///
/// `depth` is the depth assigned to `start_id`; callers normally pass 0.
/// A missing or non-exclusive start yields `Tail { role_id: None, depth }`.
/// When no child yields a tail the start node is its own tail.
pub fn get_tail(registry: &[RegisteredRole], start_id: u64, depth: usize) -> Tail {
    let mut path = Vec::new();
    resolve_tail(registry, start_id, depth, &mut path)
}

fn resolve_tail(
    registry: &[RegisteredRole],
    role_id: u64,
    depth: usize,
    path: &mut Vec<u64>,
) -> Tail {
    let no_tail = Tail {
        role_id: None,
        depth,
    };

    // A node already on the walk path means the registry loops back on itself.
    if path.contains(&role_id) {
        return no_tail;
    }

    let node = match find_role(registry, role_id) {
        Some(node) if node.exclusive => node,
        _ => return no_tail,
    };

    if node.is_terminal() {
        return Tail {
            role_id: Some(node.role_id),
            depth,
        };
    }

    path.push(role_id);
    let deepest = node
        .next_ids
        .iter()
        .map(|&child| resolve_tail(registry, child, depth + 1, path))
        .filter(|tail| tail.role_id.is_some())
        // Strictly greater keeps the first child on ties.
        .reduce(|best, tail| if tail.depth > best.depth { tail } else { best });
    path.pop();

    deepest.unwrap_or(Tail {
        role_id: Some(role_id),
        depth,
    })
}

/// Count the hops from `head_id` towards `target`, following only the first
/// child of every node.
///
/// Stops at the target, at a node with no children, at a missing node, or at a
/// node already visited. A target that sits on a non-first branch is never
/// reached; the count then reflects how far the first-child path went.
pub fn get_role_depth(registry: &[RegisteredRole], head_id: u64, target: u64) -> usize {
    let mut depth = 0;
    let mut current = head_id;
    let mut visited = HashSet::new();

    loop {
        if current == target || !visited.insert(current) {
            break;
        }

        let Some(node) = find_role(registry, current) else {
            break;
        };

        let Some(&next) = node.next_ids.first() else {
            break;
        };

        current = next;
        depth += 1;
    }

    depth
}

/// Pick the promotion for a member holding `member_roles`.
///
/// The first registry node (registry order) that the member holds and that has
/// children is revoked; all of its children are granted. `None` means the
/// member only holds terminal nodes, or none at all.
pub fn plan_promotion(registry: &[RegisteredRole], member_roles: &[u64]) -> Option<PromotionPlan> {
    registry
        .iter()
        .find(|node| !node.is_terminal() && member_roles.contains(&node.role_id))
        .map(|node| PromotionPlan {
            revoke: node.role_id,
            grant: node.next_ids.clone(),
        })
}

/// Plan the promotion out of one specific role, regardless of what else the
/// member holds. `None` when the role is unregistered or terminal.
pub fn plan_promotion_from(registry: &[RegisteredRole], role_id: u64) -> Option<PromotionPlan> {
    find_role(registry, role_id)
        .filter(|node| !node.is_terminal())
        .map(|node| PromotionPlan {
            revoke: node.role_id,
            grant: node.next_ids.clone(),
        })
}

/// Work out which exclusive roles a member has to lose.
///
/// Returns `None` unless the member holds at least two exclusive nodes. The
/// node with the greatest depth from `head_id` is kept; on equal depth the
/// earlier one in registry order wins.
pub fn plan_exclusivity(
    registry: &[RegisteredRole],
    head_id: u64,
    member_roles: &[u64],
) -> Option<ExclusivityPlan> {
    let held: Vec<u64> = registry
        .iter()
        .filter(|node| node.exclusive && member_roles.contains(&node.role_id))
        .map(|node| node.role_id)
        .collect();

    if held.len() < 2 {
        return None;
    }

    let (keep, _) = held
        .iter()
        .map(|&role_id| (role_id, get_role_depth(registry, head_id, role_id)))
        .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best })?;

    Some(ExclusivityPlan {
        keep,
        revoke: held.into_iter().filter(|&role_id| role_id != keep).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: u64 = 1;
    const B: u64 = 2;
    const C: u64 = 3;
    const D: u64 = 4;
    const E: u64 = 5;

    fn node(role_id: u64, next_ids: &[u64], exclusive: bool) -> RegisteredRole {
        RegisteredRole {
            role_id,
            next_ids: next_ids.to_vec(),
            exclusive,
        }
    }

    fn chain() -> Vec<RegisteredRole> {
        vec![node(A, &[B], true), node(B, &[C], true), node(C, &[], true)]
    }

    #[test]
    fn test_find_role() {
        let registry = chain();
        assert_eq!(find_role(&registry, B).map(|n| n.role_id), Some(B));
        assert!(find_role(&registry, 99).is_none());
    }

    #[test]
    fn test_tail_of_linear_chain() {
        let tail = get_tail(&chain(), A, 0);
        assert_eq!(tail, Tail { role_id: Some(C), depth: 2 });
    }

    #[test]
    fn test_tail_prefers_deeper_branch() {
        let registry = vec![
            node(A, &[B, C], true),
            node(B, &[], true),
            node(C, &[D], true),
            node(D, &[], true),
        ];
        assert_eq!(get_tail(&registry, A, 0), Tail { role_id: Some(D), depth: 2 });
    }

    #[test]
    fn test_tail_ties_go_to_first_child() {
        let registry = vec![node(A, &[B, C], true), node(B, &[], true), node(C, &[], true)];
        assert_eq!(get_tail(&registry, A, 0), Tail { role_id: Some(B), depth: 1 });
    }

    #[test]
    fn test_tail_of_non_exclusive_start_is_none() {
        let registry = vec![node(A, &[B], false), node(B, &[], true)];
        assert_eq!(get_tail(&registry, A, 0), Tail { role_id: None, depth: 0 });
    }

    #[test]
    fn test_tail_of_missing_start_is_none() {
        assert_eq!(get_tail(&chain(), 42, 3), Tail { role_id: None, depth: 3 });
    }

    #[test]
    fn test_tail_stops_at_non_exclusive_children() {
        // B is not exclusive, so A has nowhere deeper to go and is its own tail.
        let registry = vec![node(A, &[B], true), node(B, &[C], false), node(C, &[], true)];
        assert_eq!(get_tail(&registry, A, 0), Tail { role_id: Some(A), depth: 0 });
    }

    #[test]
    fn test_tail_survives_cycles() {
        let registry = vec![node(A, &[B], true), node(B, &[A], true)];
        assert_eq!(get_tail(&registry, A, 0), Tail { role_id: Some(B), depth: 1 });
    }

    #[test]
    fn test_depth_along_first_children() {
        let registry = chain();
        assert_eq!(get_role_depth(&registry, A, A), 0);
        assert_eq!(get_role_depth(&registry, A, B), 1);
        assert_eq!(get_role_depth(&registry, A, C), 2);
    }

    #[test]
    fn test_depth_ignores_non_first_branches() {
        // C is only reachable through A's second child; the walk goes A -> B and stops.
        let registry = vec![node(A, &[B, C], true), node(B, &[], true), node(C, &[], true)];
        assert_eq!(get_role_depth(&registry, A, C), 1);
    }

    #[test]
    fn test_depth_with_missing_head_is_zero() {
        assert_eq!(get_role_depth(&chain(), 42, C), 0);
    }

    #[test]
    fn test_depth_counts_hop_into_missing_node() {
        let registry = vec![node(A, &[B], true)];
        assert_eq!(get_role_depth(&registry, A, C), 1);
    }

    #[test]
    fn test_depth_terminates_on_cycle() {
        let registry = vec![node(A, &[B], true), node(B, &[A], true)];
        assert_eq!(get_role_depth(&registry, A, C), 2);
    }

    #[test]
    fn test_promotion_grants_all_children() {
        let registry = vec![
            node(A, &[B], false),
            node(B, &[D, E], false),
            node(D, &[], false),
            node(E, &[], false),
        ];

        let plan = plan_promotion(&registry, &[B, 77]).unwrap();
        assert_eq!(plan.revoke, B);
        assert_eq!(plan.grant, vec![D, E]);

        assert!(plan_promotion(&registry, &[D, E]).is_none());
        assert!(plan_promotion(&registry, &[]).is_none());
    }

    #[test]
    fn test_promotion_from_ignores_earlier_held_roles() {
        let registry = vec![node(A, &[B], true), node(B, &[], true), node(C, &[D], true)];

        // Member holds A and C; asked about C, A must not be touched.
        assert_eq!(
            plan_promotion(&registry, &[A, C]).map(|p| p.revoke),
            Some(A)
        );
        assert_eq!(
            plan_promotion_from(&registry, C),
            Some(PromotionPlan { revoke: C, grant: vec![D] })
        );
        assert_eq!(plan_promotion_from(&registry, B), None);
        assert_eq!(plan_promotion_from(&registry, 99), None);
    }

    #[test]
    fn test_exclusivity_keeps_deepest() {
        let plan = plan_exclusivity(&chain(), A, &[A, C]).unwrap();
        assert_eq!(plan.keep, C);
        assert_eq!(plan.revoke, vec![A]);
    }

    #[test]
    fn test_exclusivity_ignores_single_and_non_exclusive_roles() {
        let registry = vec![node(A, &[B], true), node(B, &[C], false), node(C, &[], true)];
        assert!(plan_exclusivity(&registry, A, &[A, B]).is_none());
        assert!(plan_exclusivity(&registry, A, &[C]).is_none());
    }

    #[test]
    fn test_exclusivity_tie_keeps_first_in_registry() {
        // B and C both sit off the first-child path at the same computed depth.
        let registry = vec![
            node(A, &[D], true),
            node(B, &[], true),
            node(C, &[], true),
            node(D, &[], true),
        ];
        let plan = plan_exclusivity(&registry, A, &[C, B]).unwrap();
        assert_eq!(plan.keep, B);
        assert_eq!(plan.revoke, vec![C]);
    }
}

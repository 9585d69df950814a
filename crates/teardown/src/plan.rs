//! Deletion planning: mode-dependent merge of the base/user sets and the
//! deletion-safe total order.

use std::cmp::Ordering;
use std::collections::HashSet;

use uproot_core::ManagedResource;

/// Split the classified sets into `(to_delete, to_keep)`. Without
/// `delete_all` the user set survives; with it everything goes. The deletion
/// side comes back sorted.
pub fn plan(
    base: Vec<ManagedResource>,
    user: Vec<ManagedResource>,
    delete_all: bool,
) -> (Vec<ManagedResource>, Vec<ManagedResource>) {
    let (mut to_delete, to_keep) = if delete_all {
        let mut all = base;
        all.extend(user);
        (all, Vec::new())
    } else {
        (base, user)
    };
    sort_to_delete(&mut to_delete);
    (to_delete, to_keep)
}

/// Namespaces sort last: namespace deletion cascades asynchronously, and
/// racing it ahead of explicit per-resource deletes would make delete
/// confirmations and the completion wait ambiguous. Everything else orders
/// by kind, then identity key.
pub fn sort_to_delete(resources: &mut [ManagedResource]) {
    resources.sort_by(|l, r| match (l.kind() == "Namespace", r.kind() == "Namespace") {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => l.kind().cmp(r.kind()).then_with(|| l.key().cmp(&r.key())),
    });
}

/// Move kept resources that live in a namespace slated for deletion into the
/// deletion set. The namespace delete would cascade into them regardless, so
/// the plan the operator approves must say so.
pub fn promote_cascaded(to_delete: &mut Vec<ManagedResource>, to_keep: &mut Vec<ManagedResource>) {
    let doomed: HashSet<String> = to_delete
        .iter()
        .filter(|r| r.kind() == "Namespace")
        .map(|r| r.name.clone())
        .collect();
    if doomed.is_empty() {
        return;
    }

    let mut kept = Vec::with_capacity(to_keep.len());
    let mut promoted = false;
    for resource in to_keep.drain(..) {
        let cascaded = resource
            .namespace
            .as_deref()
            .map(|ns| doomed.contains(ns))
            .unwrap_or(false);
        if cascaded {
            to_delete.push(resource);
            promoted = true;
        } else {
            kept.push(resource);
        }
    }
    *to_keep = kept;
    if promoted {
        sort_to_delete(to_delete);
    }
}

//! Recursive ContentDirectory traversal.

use log::warn;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use super::DlnaError;
use super::didl::{DidlEntry, MediaItem};

/// Walks the container tree below `root`. Each container contributes its own
/// items first, then the results of its child containers in document order are
/// appended after them.
///
/// Container ids already visited are skipped and containers deeper than
/// `max_depth` below `root` are not opened, so cyclic or runaway trees terminate.
/// `throttle` is slept before every child fetch.
pub async fn browse_tree<F, Fut>(
    root: &str,
    max_depth: usize,
    throttle: Duration,
    mut fetch: F,
) -> Result<Vec<MediaItem>, DlnaError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<DidlEntry>, DlnaError>>,
{
    let mut visited = HashSet::from([root.to_string()]);
    let mut items = Vec::new();
    let children = take_items(fetch(root.to_string()).await?, &mut items);
    let mut stack = vec![(children.into_iter(), 0usize)];

    loop {
        let Some((containers, depth)) = stack.last_mut() else {
            break;
        };
        let depth = *depth;
        let Some(id) = containers.next() else {
            stack.pop();
            continue;
        };
        if depth >= max_depth {
            warn!("DLNA browse: not descending into {id}, depth limit {max_depth} reached");
            continue;
        }
        if !visited.insert(id.clone()) {
            warn!("DLNA browse: container {id} already visited, skipping");
            continue;
        }
        if !throttle.is_zero() {
            tokio::time::sleep(throttle).await;
        }
        let children = take_items(fetch(id).await?, &mut items);
        stack.push((children.into_iter(), depth + 1));
    }

    Ok(items)
}

/// Moves the items of one listing into `items`, returning its container ids.
fn take_items(entries: Vec<DidlEntry>, items: &mut Vec<MediaItem>) -> Vec<String> {
    let mut containers = Vec::new();
    for entry in entries {
        match entry {
            DidlEntry::Item(item) => items.push(item),
            DidlEntry::Container { id, .. } => containers.push(id),
        }
    }
    containers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn item(id: &str) -> DidlEntry {
        DidlEntry::Item(MediaItem {
            id: id.to_string(),
            ..MediaItem::default()
        })
    }

    fn container(id: &str) -> DidlEntry {
        DidlEntry::Container {
            id: id.to_string(),
            title: String::new(),
        }
    }

    async fn walk(tree: HashMap<&'static str, Vec<DidlEntry>>, max_depth: usize) -> (Vec<String>, Vec<String>) {
        let fetched = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&fetched);
        let items = browse_tree("0", max_depth, Duration::ZERO, move |id: String| {
            log.lock().unwrap().push(id.clone());
            let entries = tree.get(id.as_str()).cloned().unwrap_or_default();
            async move { Ok(entries) }
        })
        .await
        .unwrap();
        let ids = items.into_iter().map(|i| i.id).collect();
        let fetched = fetched.lock().unwrap().clone();
        (ids, fetched)
    }

    #[tokio::test]
    async fn test_depth_two_tree_returns_every_leaf() {
        let tree = HashMap::from([
            ("0", vec![container("A"), item("root-1")]),
            ("A", vec![container("B"), item("a-1")]),
            ("B", vec![item("b-1")]),
        ]);
        let (ids, _) = walk(tree, 16).await;
        assert_eq!(ids.len(), 3);
        // A container's own items come before everything below it.
        assert_eq!(ids, vec!["root-1", "a-1", "b-1"]);
    }

    #[tokio::test]
    async fn test_siblings_keep_document_order() {
        let tree = HashMap::from([
            ("0", vec![container("A"), item("root-1"), container("B"), item("root-2")]),
            ("A", vec![container("A1"), item("a-1")]),
            ("A1", vec![item("a1-1")]),
            ("B", vec![item("b-1")]),
        ]);
        let (ids, fetched) = walk(tree, 16).await;
        assert_eq!(ids, vec!["root-1", "root-2", "a-1", "a1-1", "b-1"]);
        assert_eq!(fetched, vec!["0", "A", "A1", "B"]);
    }

    #[tokio::test]
    async fn test_self_referential_tree_terminates() {
        let tree = HashMap::from([
            ("0", vec![container("A"), container("0")]),
            ("A", vec![item("x"), container("A"), container("0")]),
        ]);
        let (ids, fetched) = walk(tree, 16).await;
        assert_eq!(ids, vec!["x"]);
        assert_eq!(fetched, vec!["0", "A"]);
    }

    #[tokio::test]
    async fn test_depth_limit_stops_descent() {
        // Every level links to a fresh deeper container.
        let tree = HashMap::from([
            ("0", vec![container("1"), item("i0")]),
            ("1", vec![container("2"), item("i1")]),
            ("2", vec![container("3"), item("i2")]),
            ("3", vec![item("i3")]),
        ]);
        let (ids, fetched) = walk(tree, 2).await;
        assert_eq!(fetched, vec!["0", "1", "2"]);
        assert_eq!(ids, vec!["i0", "i1", "i2"]);
    }

    #[tokio::test]
    async fn test_child_failure_propagates() {
        let result = browse_tree("0", 16, Duration::ZERO, |id: String| async move {
            if id == "0" {
                Ok(vec![container("bad")])
            } else {
                Err(DlnaError::HttpStatus(500))
            }
        })
        .await;
        assert_eq!(result, Err(DlnaError::HttpStatus(500)));
    }
}

use std::collections::HashSet;

use chrono::{TimeDelta, TimeZone, Utc};
use forumctl_core::models::Post;
use forumctl_core::tree::{build_tree, depth_violations, materialize, PostNode};
use proptest::prelude::*;
use uuid::Uuid;

// Each entry picks an optional parent among the earlier posts, plus a
// timestamp offset. Offsets collide often to exercise id tie-breaking.
fn arb_shape() -> impl Strategy<Value = Vec<(Option<prop::sample::Index>, i64)>> {
    prop::collection::vec((prop::option::of(any::<prop::sample::Index>()), 0i64..20), 1..60)
}

fn posts_from_shape(shape: &[(Option<prop::sample::Index>, i64)]) -> Vec<Post> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let thread_id = Uuid::new_v4();
    let mut posts: Vec<Post> = Vec::with_capacity(shape.len());

    for (i, (parent, offset)) in shape.iter().enumerate() {
        let parent_idx = match parent {
            Some(idx) if i > 0 => Some(idx.index(i)),
            _ => None,
        };
        let (parent_post_id, depth) = match parent_idx {
            Some(p) => (Some(posts[p].id), posts[p].depth + 1),
            None => (None, 0),
        };
        let at = base + TimeDelta::seconds(*offset);
        posts.push(Post {
            id: Uuid::new_v4(),
            thread_id,
            content: format!("post {}", i),
            author_id: Uuid::nil(),
            parent_post_id,
            depth,
            likes_count: 0,
            replies_count: 0,
            created_at: at,
            updated_at: at,
        });
        if let Some(p) = parent_idx {
            posts[p].replies_count += 1;
        }
    }
    posts
}

fn check_node(node: &PostNode) -> Result<(), TestCaseError> {
    for pair in node.children.windows(2) {
        let (a, b) = (&pair[0].post, &pair[1].post);
        prop_assert!((a.created_at, a.id) <= (b.created_at, b.id));
    }
    for child in &node.children {
        prop_assert_eq!(child.post.parent_post_id, Some(node.post.id));
        prop_assert_eq!(child.post.depth, node.post.depth + 1);
        check_node(child)?;
    }
    prop_assert_eq!(node.has_children, node.post.replies_count > 0);
    Ok(())
}

proptest! {
    #[test]
    fn generated_batches_satisfy_depth_rule(shape in arb_shape()) {
        let posts = posts_from_shape(&shape);
        prop_assert!(depth_violations(&posts).is_empty());
    }

    #[test]
    fn build_keeps_every_post_and_orders_children(shape in arb_shape()) {
        let posts = posts_from_shape(&shape);
        let forest = build_tree(&posts, &HashSet::new());

        let total: usize = forest.iter().map(PostNode::subtree_len).sum();
        prop_assert_eq!(total, posts.len());
        for root in &forest {
            prop_assert!(root.post.parent_post_id.is_none());
            check_node(root)?;
        }
    }

    #[test]
    fn build_ignores_input_order(
        (posts, shuffled) in arb_shape()
            .prop_map(|shape| posts_from_shape(&shape))
            .prop_flat_map(|posts| (Just(posts.clone()), Just(posts).prop_shuffle()))
    ) {
        let a = build_tree(&posts, &HashSet::new());
        let b = build_tree(&shuffled, &HashSet::new());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn materialized_depth_never_exceeds_limit(shape in arb_shape(), max_depth in 1u32..6) {
        let posts = posts_from_shape(&shape);
        let forest = materialize(&posts, &HashSet::new(), max_depth);

        let mut stack: Vec<(&PostNode, u32)> = forest.iter().map(|n| (n, 1)).collect();
        while let Some((node, level)) = stack.pop() {
            prop_assert!(level <= max_depth);
            if level == max_depth {
                prop_assert!(node.children.is_empty());
                prop_assert_eq!(node.continue_thread.is_some(), node.has_children);
            }
            stack.extend(node.children.iter().map(|c| (c, level + 1)));
        }
    }
}

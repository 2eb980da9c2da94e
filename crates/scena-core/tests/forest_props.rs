use proptest::prelude::*;
use scena_core::drag::{DragItem, DragSession, DropOutcome, DropTarget};
use scena_core::forest::{Forest, descendants_of, gantt_rows, project_by_column, project_global};
use scena_core::model::{Task, TaskId};
use scena_core::replica::Replica;
use std::collections::HashSet;

use generators::*;

fn assert_every_task_once(forest: &Forest, tasks: &[Task]) -> Result<(), TestCaseError> {
    let flat: Vec<&TaskId> = forest.flatten().iter().map(|n| &n.task.id).collect();
    let unique: HashSet<&TaskId> = flat.iter().copied().collect();
    prop_assert_eq!(flat.len(), unique.len());
    prop_assert_eq!(flat.len(), tasks.len());
    Ok(())
}

fn depth_of(tasks: &[Task], task: &Task) -> u32 {
    let mut depth = 0;
    let mut cursor = task.parent_id.clone();
    while let Some(parent) = cursor {
        let Some(p) = tasks.iter().find(|t| t.id == parent) else {
            break;
        };
        depth += 1;
        cursor = p.parent_id.clone();
    }
    depth
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn both_projections_show_every_task_once(tasks in arb_tangled_tasks()) {
        assert_every_task_once(&project_by_column(&tasks), &tasks)?;
        assert_every_task_once(&project_global(&tasks), &tasks)?;
    }

    #[test]
    fn kanban_children_share_parent_column(tasks in arb_acyclic_tasks()) {
        let forest = project_by_column(&tasks);
        for node in forest.iter() {
            for child in forest.children_of(&node.task.id) {
                prop_assert_eq!(&child.task.column_id, &node.task.column_id);
            }
        }
    }

    #[test]
    fn child_sort_key_extends_parent(tasks in arb_acyclic_tasks()) {
        let forest = project_global(&tasks);
        for node in forest.iter() {
            for child in forest.children_of(&node.task.id) {
                let prefix = format!("{}.", node.sort_key);
                prop_assert!(child.sort_key.starts_with(&prefix));
            }
        }
    }

    #[test]
    fn sibling_sort_keys_follow_order(tasks in arb_acyclic_tasks()) {
        let forest = project_by_column(&tasks);
        let groups = std::iter::once(forest.roots().collect::<Vec<_>>())
            .chain(forest.iter().map(|n| forest.children_of(&n.task.id).collect()));
        for siblings in groups {
            for pair in siblings.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                prop_assert!(a.task.order <= b.task.order);
                prop_assert!(a.sort_key <= b.sort_key, "{} > {}", a.sort_key, b.sort_key);
            }
        }
    }

    #[test]
    fn level_counts_ancestors_regardless_of_column(tasks in arb_acyclic_tasks()) {
        let kanban = project_by_column(&tasks);
        for task in &tasks {
            prop_assert_eq!(kanban.level(&task.id), Some(depth_of(&tasks, task)));
        }
        prop_assert!(kanban.cycles().is_empty());
    }

    #[test]
    fn cyclic_chains_sit_at_level_zero(tasks in arb_tangled_tasks()) {
        let forest = project_global(&tasks);
        for id in forest.cycles() {
            prop_assert_eq!(forest.level(id), Some(0));
        }
    }

    #[test]
    fn siblings_are_in_ascending_order(tasks in arb_tangled_tasks()) {
        let forest = project_global(&tasks);
        let roots: Vec<i64> = forest.roots().map(|n| n.task.order).collect();
        prop_assert!(roots.windows(2).all(|w| w[0] <= w[1]));
        for node in forest.iter() {
            let kids: Vec<i64> = forest.children_of(&node.task.id).map(|n| n.task.order).collect();
            prop_assert!(kids.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn hidden_tasks_drop_their_subtree(tasks in arb_acyclic_tasks(), mask in arb_hidden_mask()) {
        let tasks: Vec<Task> = tasks
            .into_iter()
            .zip(mask)
            .map(|(mut t, hidden)| {
                t.is_hidden_in_gantt = hidden;
                t
            })
            .collect();
        let forest = project_global(&tasks);
        let shown: HashSet<&TaskId> = gantt_rows(&forest).iter().map(|n| &n.task.id).collect();
        for task in tasks.iter().filter(|t| t.is_hidden_in_gantt) {
            prop_assert!(!shown.contains(&task.id));
            for kid in descendants_of(&tasks, &task.id) {
                prop_assert!(!shown.contains(&kid));
            }
        }
    }

    #[test]
    fn dropping_on_a_column_carries_the_subtree(
        tasks in arb_acyclic_tasks(),
        pick in any::<prop::sample::Index>(),
        column in 0usize..COLUMN_IDS.len(),
    ) {
        prop_assume!(!tasks.is_empty());
        let dragged = tasks[pick.index(tasks.len())].id.clone();
        let target = DropTarget::Column(COLUMN_IDS[column].into());
        let mut replica = Replica::from_server(columns(), tasks.clone());
        let mut session = DragSession::new();

        session.start(DragItem::Task(dragged.clone()), &mut replica).expect("start");
        session.over(&target, &mut replica).expect("over");
        let outcome = session.end(Some(&target), &mut replica).expect("end");
        prop_assert!(!session.is_dragging());

        if outcome == DropOutcome::NoOp {
            prop_assert_eq!(replica.tasks(), tasks.as_slice());
            return Ok(());
        }
        let moved = replica.task(&dragged).expect("task kept");
        prop_assert_eq!(moved.column_id.as_str(), COLUMN_IDS[column]);
        for id in descendants_of(&tasks, &dragged) {
            let task = replica.task(&id).expect("task kept");
            let original = tasks.iter().find(|t| t.id == id).expect("in input");
            prop_assert_eq!(task.column_id.as_str(), COLUMN_IDS[column]);
            prop_assert_eq!(task.order, original.order);
        }
    }

    #[test]
    fn dropping_outside_restores_every_task(
        tasks in arb_acyclic_tasks(),
        pick in any::<prop::sample::Index>(),
        column in 0usize..COLUMN_IDS.len(),
    ) {
        prop_assume!(!tasks.is_empty());
        let dragged = tasks[pick.index(tasks.len())].id.clone();
        let mut replica = Replica::from_server(columns(), tasks.clone());
        let mut session = DragSession::new();

        session.start(DragItem::Task(dragged), &mut replica).expect("start");
        session
            .over(&DropTarget::Column(COLUMN_IDS[column].into()), &mut replica)
            .expect("over");
        session.end(None, &mut replica).expect("end");

        prop_assert_eq!(replica.tasks(), tasks.as_slice());
        prop_assert!(!replica.has_pending());
    }
}

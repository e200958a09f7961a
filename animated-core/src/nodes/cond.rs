//! Conditional branch selection.

use crate::error::Result;
use crate::graph::{FrameScheduler, Node, NodeKind, Parents};
use crate::native::NativeConfig;
use crate::value::Value;

use super::Operand;

/// Node state for [`NodeKind::Cond`].
///
/// Both branches are wired as parents for attach/detach, but only the branch
/// selected by the condition is evaluated.
pub struct CondNode {
    condition: Operand,
    if_block: Operand,
    else_block: Operand,
}

impl CondNode {
    pub(crate) fn parents(&self) -> Parents {
        [&self.condition, &self.if_block, &self.else_block]
            .into_iter()
            .filter_map(Operand::as_node)
            .cloned()
            .collect()
    }

    pub(crate) fn evaluate(&self, scheduler: &FrameScheduler) -> Result<Value> {
        if self.condition.read(scheduler)?.is_truthy() {
            self.if_block.read(scheduler)
        } else {
            self.else_block.read(scheduler)
        }
    }

    pub(crate) fn native_config(&self, scheduler: &FrameScheduler) -> Result<NativeConfig> {
        Ok(NativeConfig::Cond {
            condition: self.condition.to_native(scheduler)?,
            if_block: self.if_block.to_native(scheduler)?,
            else_block: self.else_block.to_native(scheduler)?,
        })
    }
}

impl Node {
    /// Select `if_block` when `condition` is truthy, else `else_block`.
    pub fn cond(
        condition: impl Into<Operand>,
        if_block: impl Into<Operand>,
        else_block: impl Into<Operand>,
    ) -> Node {
        Node::from_kind(NodeKind::Cond(CondNode {
            condition: condition.into(),
            if_block: if_block.into(),
            else_block: else_block.into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counted(calls: &Rc<Cell<u32>>, result: f64) -> Node {
        let calls = Rc::clone(calls);
        Node::functor(vec![], move |_| {
            calls.set(calls.get() + 1);
            Ok(Value::from(result))
        })
    }

    #[test]
    fn unselected_branch_is_never_evaluated() {
        let scheduler = FrameScheduler::new();
        let taken = Rc::new(Cell::new(0));
        let skipped = Rc::new(Cell::new(0));
        let condition = Node::value(1.0);
        let cond = Node::cond(&condition, counted(&taken, 10.0), counted(&skipped, 20.0));

        for frame in 1..=5 {
            scheduler.run_frame(frame as f64 * 16.0);
            assert_eq!(cond.number(&scheduler).unwrap(), 10.0);
        }
        assert_eq!(taken.get(), 5);
        assert_eq!(skipped.get(), 0);

        condition.set_value(&scheduler, 0.0).unwrap();
        assert_eq!(cond.number(&scheduler).unwrap(), 20.0);
        assert_eq!(skipped.get(), 1);
    }

    #[test]
    fn literal_branches_are_not_parents() {
        let condition = Node::value(0.0);
        let cond = Node::cond(&condition, "visible", 0.0);
        assert_eq!(cond.parents(), vec![condition]);

        let scheduler = FrameScheduler::new();
        assert_eq!(cond.get_value(&scheduler).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn both_branches_are_wired_on_attach() {
        let scheduler = FrameScheduler::new();
        let condition = Node::value(1.0);
        let a = Node::value(1.0);
        let b = Node::value(2.0);
        let cond = Node::cond(&condition, &a, &b);

        cond.attach(&scheduler).unwrap();
        assert_eq!(a.child_count(), 1);
        assert_eq!(b.child_count(), 1);
        cond.detach(&scheduler).unwrap();
        assert_eq!(b.child_count(), 0);
    }
}

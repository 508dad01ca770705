use crate::object::Object;

use super::{InvalidLocalSnafu, RuntimeError, StackOverflowSnafu};

/// Operand stack shared by all frames. A frame's parameters and locals live
/// at `base_pointer..base_pointer + locals`, temporaries above them.
#[derive(Debug)]
pub struct Stack {
    stack: Vec<Object>,
    pub sp: usize,
}

impl Stack {
    pub fn new(size: usize) -> Self {
        Self {
            stack: vec![Object::Void; size],
            sp: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self, obj: Object) -> Result<(), RuntimeError> {
        if self.sp >= self.stack.len() {
            return StackOverflowSnafu {
                limit: self.stack.len(),
            }
            .fail();
        }

        self.stack[self.sp] = obj;
        self.sp += 1;

        Ok(())
    }

    pub fn pop(&mut self) -> Result<Object, RuntimeError> {
        if self.sp == 0 {
            return Err(RuntimeError::StackUnderflow);
        }

        self.sp -= 1;
        Ok(std::mem::take(&mut self.stack[self.sp]))
    }

    /// Pops `count` values, returned in push order.
    pub fn pop_many(&mut self, count: usize) -> Result<Vec<Object>, RuntimeError> {
        if count > self.sp {
            return Err(RuntimeError::StackUnderflow);
        }

        let start = self.sp - count;
        let values = self.stack[start..self.sp]
            .iter_mut()
            .map(std::mem::take)
            .collect();
        self.sp = start;
        Ok(values)
    }

    /// Reserves `count` zeroed slots for locals.
    pub fn add_sp(&mut self, count: usize) -> Result<(), RuntimeError> {
        if self.sp + count > self.stack.len() {
            return StackOverflowSnafu {
                limit: self.stack.len(),
            }
            .fail();
        }

        self.sp += count;
        Ok(())
    }

    /// Drops everything from `sp` upwards.
    pub fn truncate(&mut self, sp: usize) {
        while self.sp > sp {
            self.sp -= 1;
            self.stack[self.sp] = Object::Void;
        }
    }

    pub fn set_local(
        &mut self,
        base_pointer: usize,
        local_index: u16,
        obj: Object,
    ) -> Result<(), RuntimeError> {
        let idx = base_pointer + local_index as usize;
        if idx >= self.sp {
            return InvalidLocalSnafu { slot: local_index }.fail();
        }

        self.stack[idx] = obj;
        Ok(())
    }

    pub fn get_local(
        &self,
        base_pointer: usize,
        local_index: u16,
    ) -> Result<&Object, RuntimeError> {
        let idx = base_pointer + local_index as usize;
        if idx >= self.sp {
            return InvalidLocalSnafu { slot: local_index }.fail();
        }

        Ok(&self.stack[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop() {
        let mut stack = Stack::new(2);
        stack.push(Object::Int(1)).unwrap();
        stack.push(Object::Int(2)).unwrap();
        assert!(matches!(
            stack.push(Object::Int(3)),
            Err(RuntimeError::StackOverflow { limit: 2 })
        ));

        assert_eq!(stack.pop().unwrap(), Object::Int(2));
        assert_eq!(stack.pop().unwrap(), Object::Int(1));
        assert!(matches!(stack.pop(), Err(RuntimeError::StackUnderflow)));
    }

    #[test]
    fn locals() {
        let mut stack = Stack::new(8);
        stack.push(Object::Bool(true)).unwrap();
        stack.add_sp(2).unwrap();

        stack.set_local(1, 1, Object::UInt(7)).unwrap();
        assert_eq!(stack.get_local(1, 0).unwrap(), &Object::Void);
        assert_eq!(stack.get_local(1, 1).unwrap(), &Object::UInt(7));
        assert!(matches!(
            stack.get_local(1, 2),
            Err(RuntimeError::InvalidLocal { slot: 2 })
        ));

        stack.truncate(1);
        assert_eq!(stack.sp, 1);
        assert!(matches!(stack.add_sp(8), Err(RuntimeError::StackOverflow { .. })));
    }

    #[test]
    fn pop_many_keeps_order() {
        let mut stack = Stack::new(4);
        for val in 1..=3 {
            stack.push(Object::Int(val)).unwrap();
        }

        assert_eq!(
            stack.pop_many(2).unwrap(),
            vec![Object::Int(2), Object::Int(3)]
        );
        assert_eq!(stack.sp, 1);
        assert!(matches!(stack.pop_many(2), Err(RuntimeError::StackUnderflow)));
    }
}

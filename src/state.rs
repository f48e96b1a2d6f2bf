/*
 * Simulation State Module
 *
 * Two equally sized entity buffers form a double buffer: one is readable,
 * the other is the step target. The writable side is only reachable through a
 * StepScope, and swapping needs `&mut self`, so the borrow checker rules out a
 * swap while a step still holds the writable buffer.
 */

use crate::device::Buffer;

/// Two-slot owner with alternating read/write roles.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    // Index of the readable slot
    readable: usize,
}

/// Borrow of both slots for the duration of one step.
pub struct StepScope<'a, T> {
    pub readable: &'a T,
    pub writable: &'a mut T,
}

impl<T> DoubleBuffer<T> {
    // `front` starts out readable
    pub fn new(front: T, back: T) -> Self {
        Self {
            slots: [front, back],
            readable: 0,
        }
    }

    pub fn readable(&self) -> &T {
        &self.slots[self.readable]
    }

    pub fn begin_step(&mut self) -> StepScope<'_, T> {
        let (first, second) = self.slots.split_at_mut(1);
        if self.readable == 0 {
            StepScope {
                readable: &first[0],
                writable: &mut second[0],
            }
        } else {
            StepScope {
                readable: &second[0],
                writable: &mut first[0],
            }
        }
    }

    // Exchange roles; no data moves
    pub fn swap(&mut self) {
        self.readable ^= 1;
    }

    // Index of the readable slot, 0 for the buffer passed as `front`
    pub fn readable_slot(&self) -> usize {
        self.readable
    }
}

/// Device-resident state of a running simulation.
#[derive(Debug)]
pub struct SimulationState {
    buffers: DoubleBuffer<Buffer>,
    attributes: Buffer,
    entity_count: u32,
}

impl SimulationState {
    pub fn new(front: Buffer, back: Buffer, attributes: Buffer, entity_count: u32) -> Self {
        Self {
            buffers: DoubleBuffer::new(front, back),
            attributes,
            entity_count,
        }
    }

    pub fn readable(&self) -> &Buffer {
        self.buffers.readable()
    }

    pub fn readable_slot(&self) -> usize {
        self.buffers.readable_slot()
    }

    /// Both state buffers for one step, plus the render attributes it writes.
    pub fn begin_step(&mut self) -> (StepScope<'_, Buffer>, &Buffer) {
        (self.buffers.begin_step(), &self.attributes)
    }

    pub fn swap(&mut self) {
        self.buffers.swap();
    }

    pub fn attributes(&self) -> &Buffer {
        &self.attributes
    }

    pub fn entity_count(&self) -> u32 {
        self.entity_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_alternate() {
        let mut buffers = DoubleBuffer::new("front", "back");
        assert_eq!(*buffers.readable(), "front");

        {
            let scope = buffers.begin_step();
            assert_eq!(*scope.readable, "front");
            assert_eq!(*scope.writable, "back");
        }

        buffers.swap();
        assert_eq!(*buffers.readable(), "back");
        assert_eq!(buffers.readable_slot(), 1);
        let scope = buffers.begin_step();
        assert_eq!(*scope.writable, "front");

        buffers.swap();
        assert_eq!(*buffers.readable(), "front");
        assert_eq!(buffers.readable_slot(), 0);
    }

    #[test]
    fn test_writes_land_in_writable_slot() {
        let mut buffers = DoubleBuffer::new(vec![1, 2, 3], vec![0, 0, 0]);
        {
            let scope = buffers.begin_step();
            for (out, value) in scope.writable.iter_mut().zip(scope.readable.iter()) {
                *out = value * 10;
            }
        }
        assert_eq!(buffers.readable(), &vec![1, 2, 3]);
        buffers.swap();
        assert_eq!(buffers.readable(), &vec![10, 20, 30]);
    }
}

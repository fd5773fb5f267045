use crate::common::config::FrameId;

/// Per-frame replacer state: whether the frame currently sits in the
/// replacer, and its second-chance reference bit.
#[derive(Debug, Clone, Copy)]
struct ClockSlot {
    in_replacer: bool,
    ref_bit: bool,
}

/// ClockReplacer implements the clock (second-chance) replacement policy.
///
/// Candidate frames are arranged in a circle; a hand sweeps clockwise over
/// them. A frame whose reference bit is set gets a second chance (the bit is
/// cleared and the hand moves on); the first candidate found with a clear
/// bit is the victim. Because each set bit is cleared at most once per
/// sweep, a victim is found within two revolutions.
///
/// The replacer keeps no lock of its own; it lives inside the buffer pool's
/// bookkeeping latch.
#[derive(Debug)]
pub struct ClockReplacer {
    slots: Vec<ClockSlot>,
    hand: usize,
    size: usize,
}

impl ClockReplacer {
    /// @brief Creates a ClockReplacer tracking `num_frames` frames, none of
    /// which start out as eviction candidates.
    pub fn new(num_frames: usize) -> Self {
        Self {
            slots: vec![
                ClockSlot {
                    in_replacer: false,
                    ref_bit: false,
                };
                num_frames
            ],
            hand: 0,
            size: 0,
        }
    }

    /// @brief Sweep from the hand position and evict the first candidate
    /// frame whose reference bit is clear, clearing set bits along the way.
    ///
    /// @return the victim frame id, or None if no frame is evictable
    pub fn victim(&mut self) -> Option<FrameId> {
        while self.size > 0 {
            if self.hand == self.slots.len() {
                self.hand = 0;
            }
            let slot = &mut self.slots[self.hand];
            if !slot.in_replacer {
                self.hand += 1;
            } else if slot.ref_bit {
                slot.ref_bit = false;
                self.hand += 1;
            } else {
                slot.in_replacer = false;
                self.size -= 1;
                let victim = self.hand;
                self.hand += 1;
                return Some(victim);
            }
        }
        None
    }

    /// @brief Removes the frame from the replacer; called after a page is
    /// pinned. Idempotent.
    pub fn pin(&mut self, frame_id: FrameId) {
        let slot = &mut self.slots[frame_id];
        if slot.in_replacer {
            slot.in_replacer = false;
            self.size -= 1;
        }
    }

    /// @brief Inserts the frame into the replacer with its reference bit
    /// set; called when a page's pin count drops to zero. Idempotent.
    pub fn unpin(&mut self, frame_id: FrameId) {
        let slot = &mut self.slots[frame_id];
        if !slot.in_replacer {
            slot.in_replacer = true;
            slot.ref_bit = true;
            self.size += 1;
        }
    }

    /// @brief Returns the number of frames currently eligible for eviction.
    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::ClockReplacer;

    #[test]
    fn test_clock_sample() {
        let mut clock_replacer = ClockReplacer::new(7);

        // Scenario: unpin six elements, i.e. add them to the replacer.
        clock_replacer.unpin(1);
        clock_replacer.unpin(2);
        clock_replacer.unpin(3);
        clock_replacer.unpin(4);
        clock_replacer.unpin(5);
        clock_replacer.unpin(6);
        clock_replacer.unpin(1);
        assert_eq!(6, clock_replacer.size());

        // Scenario: get three victims from the clock. The first sweep clears
        // every reference bit, so eviction proceeds in frame order.
        assert_eq!(Some(1), clock_replacer.victim());
        assert_eq!(Some(2), clock_replacer.victim());
        assert_eq!(Some(3), clock_replacer.victim());

        // Scenario: pin elements in the replacer. Note that 3 has already
        // been victimized, so pinning 3 should have no effect.
        clock_replacer.pin(3);
        clock_replacer.pin(4);
        assert_eq!(2, clock_replacer.size());

        // Scenario: unpin 4. We expect that the reference bit of 4 will be
        // set to 1.
        clock_replacer.unpin(4);

        // Scenario: continue looking for victims. We expect these victims.
        assert_eq!(Some(5), clock_replacer.victim());
        assert_eq!(Some(6), clock_replacer.victim());
        assert_eq!(Some(4), clock_replacer.victim());

        // Scenario: the replacer is now empty.
        assert_eq!(None, clock_replacer.victim());
        assert_eq!(0, clock_replacer.size());
    }

    #[test]
    fn test_pin_unpin_idempotent() {
        let mut clock_replacer = ClockReplacer::new(3);

        clock_replacer.unpin(0);
        clock_replacer.unpin(0);
        assert_eq!(1, clock_replacer.size());

        clock_replacer.pin(0);
        clock_replacer.pin(0);
        assert_eq!(0, clock_replacer.size());
        assert_eq!(None, clock_replacer.victim());
    }

    #[test]
    fn test_second_chance_ordering() {
        let mut clock_replacer = ClockReplacer::new(4);
        clock_replacer.unpin(0);
        clock_replacer.unpin(1);
        clock_replacer.unpin(2);

        // First victim costs a full sweep clearing reference bits.
        assert_eq!(Some(0), clock_replacer.victim());

        // A pin/unpin cycle on 1 refreshes its reference bit, so 2 goes
        // first.
        clock_replacer.pin(1);
        clock_replacer.unpin(1);
        assert_eq!(Some(2), clock_replacer.victim());
        assert_eq!(Some(1), clock_replacer.victim());
    }
}

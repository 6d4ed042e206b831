use crate::error::{EngineError, EngineResult};

/// Immutable unlock schedule for a single holder.
///
/// `unlock_amount(month)` is a pure function of the month index. The linear
/// ticks are sized so that the final tick closes any floating-point residual
/// and the unlocks sum to the allocation exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct VestingSchedule {
    allocation: f64,
    tge_percent: f64,
    cliff_months: u32,
    vesting_months: u32,
}

impl VestingSchedule {
    pub fn new(
        allocation: f64,
        tge_percent: f64,
        cliff_months: u32,
        vesting_months: u32,
    ) -> EngineResult<Self> {
        if !allocation.is_finite() || allocation < 0.0 {
            return Err(EngineError::validation(format!(
                "vesting allocation must be a non-negative number, got {allocation}"
            )));
        }
        if !(0.0..=100.0).contains(&tge_percent) {
            return Err(EngineError::validation(format!(
                "TGE percent must be in [0, 100], got {tge_percent}"
            )));
        }
        if vesting_months == 0 && tge_percent < 100.0 {
            return Err(EngineError::validation(
                "vesting_months = 0 requires a 100% TGE unlock",
            ));
        }
        Ok(VestingSchedule {
            allocation,
            tge_percent,
            cliff_months,
            vesting_months,
        })
    }

    pub fn allocation(&self) -> f64 {
        self.allocation
    }

    pub fn cliff_months(&self) -> u32 {
        self.cliff_months
    }

    /// The first month in which a post-cliff linear tick unlocks.
    /// With no cliff the linear stream starts at month 0.
    pub fn first_post_cliff_month(&self) -> u32 {
        if self.cliff_months == 0 {
            0
        } else {
            self.cliff_months + 1
        }
    }

    /// Last month with a non-zero unlock.
    pub fn final_unlock_month(&self) -> u32 {
        if self.vesting_months == 0 {
            return 0;
        }
        if self.cliff_months == 0 {
            self.vesting_months - 1
        } else {
            self.cliff_months + self.vesting_months
        }
    }

    /// Tokens unlocked in the given month.
    pub fn unlock_amount(&self, month: u32) -> f64 {
        let tge_amount = self.allocation * self.tge_percent / 100.0;
        let remaining = self.allocation - tge_amount;

        if self.vesting_months == 0 {
            // 100% TGE: everything at month 0, nothing after.
            return if month == 0 { self.allocation } else { 0.0 };
        }

        let tick = remaining / self.vesting_months as f64;
        let last = self.final_unlock_month();

        if self.cliff_months == 0 {
            // Linear stream runs over months 0..vesting; month 0 also
            // carries the TGE unlock.
            match month {
                0 if last == 0 => self.allocation,
                0 => tge_amount + tick,
                m if m < last => tick,
                m if m == last => remaining - tick * (self.vesting_months - 1) as f64,
                _ => 0.0,
            }
        } else {
            // Cliff: nothing between TGE and the first post-cliff month.
            let first = self.cliff_months + 1;
            match month {
                0 => tge_amount,
                m if m < first => 0.0,
                m if m < last => tick,
                m if m == last => remaining - tick * (self.vesting_months - 1) as f64,
                _ => 0.0,
            }
        }
    }

    /// Total unlocked over months `0..=month`.
    pub fn cumulative_unlocked(&self, month: u32) -> f64 {
        (0..=month).map(|m| self.unlock_amount(m)).sum()
    }
}

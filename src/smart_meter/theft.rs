/* ----------------- Theft detection ------------------ */

use super::config::TheftConfig;
use super::hal::{DigitalOutput, TimeSource};
use super::types::TheftState;

/// Compares the main feed against the sum of monitored loads and raises an
/// audible alert once an unexplained difference has persisted long enough.
///
/// State is transient: a restart always begins in `Normal`.
#[derive(Debug)]
pub struct TheftMonitor<C, O> {
    clock: C,
    output: O,
    threshold: f64,
    confirmation_ms: u64,
    half_period_ms: u64,
    state: TheftState,
    alert_active: bool,
    alert_since_ms: u64,
    buzzer_on: bool,
}

impl<C: TimeSource, O: DigitalOutput> TheftMonitor<C, O> {
    pub fn new(clock: C, mut output: O, config: &TheftConfig) -> Self {
        output.write(false);
        log::info!(
            "Theft detection initialized (threshold {:.4} A, confirmation {} s)",
            config.threshold_amps,
            config.confirmation_secs
        );

        Self {
            clock,
            output,
            threshold: config.threshold_amps,
            confirmation_ms: config.confirmation_window().as_millis() as u64,
            half_period_ms: config.buzzer_half_period_ms.max(1),
            state: TheftState::Normal,
            alert_active: false,
            alert_since_ms: 0,
            buzzer_on: false,
        }
    }

    /*
    * @brief Evaluate one pair of currents.
    * @param main_current Main feed current in A
    * @param loads_current Sum of the monitored load currents in A
    * @return true only on the cycle where theft becomes confirmed
    * @note A confirmed theft stays confirmed until clear_alert(), whatever the currents do.
    */
    pub fn check_theft(&mut self, main_current: f64, loads_current: f64) -> bool {
        let difference = main_current - loads_current;
        let now = self.clock.now_ms();

        // NaN compares false and is handled like a difference within threshold.
        if difference > self.threshold {
            match self.state {
                TheftState::Normal => {
                    self.state = TheftState::Suspected { since_ms: now };
                    log::warn!("Potential theft detected ({:.4} A unaccounted), monitoring...", difference);
                }
                TheftState::Suspected { since_ms } => {
                    if now.saturating_sub(since_ms) >= self.confirmation_ms {
                        self.state = TheftState::Confirmed;
                        self.alert_active = true;
                        self.alert_since_ms = now;
                        log::error!("THEFT CONFIRMED! Alert activated, current difference {:.4} A", difference);
                        return true;
                    }
                }
                TheftState::Confirmed => {}
            }
        } else if let TheftState::Suspected { .. } = self.state {
            self.state = TheftState::Normal;
            log::info!("False alarm, current difference back to {:.4} A", difference);
        }

        false
    }

    /*
    * @brief Drive the alert output.
    * @note The level is a function of the time since confirmation only, toggling
    *       every half period, so the call rate just has to resolve the half period.
    */
    pub fn update_buzzer(&mut self) {
        if !self.alert_active {
            self.buzzer_on = false;
            self.output.write(false);
            return;
        }

        let elapsed = self.clock.now_ms().saturating_sub(self.alert_since_ms);
        let on = (elapsed / self.half_period_ms) % 2 == 0;

        if on != self.buzzer_on {
            self.buzzer_on = on;
            self.output.write(on);
        }
    }

    /// Manual override: back to `Normal` with the alert silenced, from any state.
    pub fn clear_alert(&mut self) {
        self.state = TheftState::Normal;
        self.alert_active = false;
        self.buzzer_on = false;
        self.output.write(false);
        log::info!("Theft alert cleared by user");
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TheftState::Confirmed
    }

    /*
    * @brief Whole seconds left before a suspicion is confirmed, for display.
    * @return 0 unless the monitor is in the Suspected state
    */
    pub fn remaining_confirmation_time(&self) -> u64 {
        match self.state {
            TheftState::Suspected { since_ms } => {
                let elapsed = self.clock.now_ms().saturating_sub(since_ms);
                self.confirmation_ms.saturating_sub(elapsed) / 1000
            }
            _ => 0,
        }
    }

    pub fn state(&self) -> TheftState {
        self.state
    }

    pub fn is_alert_active(&self) -> bool {
        self.alert_active
    }

    pub fn is_buzzer_on(&self) -> bool {
        self.buzzer_on
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

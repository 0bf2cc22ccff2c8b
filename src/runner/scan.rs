//! Scan interpretation: set-point generation and approach-mode policies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::device::{Direction, SweepProgram};
use super::error::{RunError, RunResult};
use super::timer::Timer;
use super::{SequenceRunner, TimeScanPolicy, WaitChannels};
use crate::sequence::{
    ApproachMode, Command, EndMode, ScanField, ScanPosition, ScanTemperature, ScanTime, SetField,
    SetTemperature, Spacing, map_to_shape,
};

/// Durations closer to zero than this count as zero.
const ZERO_DURATION: f64 = 1e-9;

fn sweep_program(setpoints: &[f64], rate: f64, spacing: Spacing) -> SweepProgram {
    SweepProgram {
        start: setpoints.first().copied().unwrap_or_default(),
        end: setpoints.last().copied().unwrap_or_default(),
        n_steps: setpoints.len(),
        setpoints: setpoints.to_vec(),
        rate,
        spacing,
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl SequenceRunner {
    /// Points of a no-overshoot approach from `from` to `to`, crowded towards `from`.
    fn approach_ramp(&self, from: f64, to: f64) -> RunResult<Vec<f64>> {
        Ok(map_to_shape(f64::ln, from, to, self.config.approach_steps.max(2))?)
    }

    /// Poll `check` with the configured timeout until it reports success.
    fn await_condition(&self, mut check: impl FnMut(Duration) -> RunResult<bool>) -> RunResult<()> {
        let timeout = self.config.poll_interval();
        loop {
            self.check_running()?;
            if check(timeout)? {
                return Ok(());
            }
        }
    }

    fn await_temperature(
        &self,
        target: f64,
        direction: Direction,
        approach: ApproachMode,
    ) -> RunResult<()> {
        self.await_condition(|timeout| {
            self.call("check_stable_temp", |d| {
                d.check_stable_temp(target, direction, approach, Some(timeout))
            })
        })
    }

    fn await_field(&self, target: f64, direction: Direction, approach: ApproachMode) -> RunResult<()> {
        self.await_condition(|timeout| {
            self.call("check_field", |d| {
                d.check_field(target, direction, approach, Some(timeout))
            })
        })
    }

    fn await_position(
        &self,
        target: f64,
        direction: Direction,
        approach: ApproachMode,
    ) -> RunResult<()> {
        self.await_condition(|timeout| {
            self.call("check_position", |d| {
                d.check_position(target, direction, approach, Some(timeout))
            })
        })
    }

    fn settle(&self, channels: WaitChannels) -> RunResult<()> {
        self.wait(channels, self.config.approach_settle_secs)
    }

    pub(super) fn execute_scan_temperature(&self, scan: &ScanTemperature) -> RunResult<()> {
        let points = map_to_shape(|x| scan.spacing.shape(x), scan.start, scan.end, scan.n_steps)?;
        let direction = Direction::from_delta(scan.end - scan.start);
        debug!(runner = %self.id, ?points, approach = %scan.approach, "temperature scan");

        match scan.approach {
            ApproachMode::Fast => {
                for &temperature in &points {
                    self.set_temperature(temperature)?;
                    self.await_temperature(temperature, direction, ApproachMode::Fast)?;
                    self.execute_all(&scan.children)?;
                }
            }
            ApproachMode::NoOvershoot => {
                let channels = WaitChannels {
                    temperature: true,
                    ..WaitChannels::default()
                };
                let mut previous = points[0];
                for &temperature in &points {
                    let finished = self.call("check_stable_temp", |d| {
                        d.check_stable_temp(
                            scan.end,
                            Direction::Steady,
                            ApproachMode::NoOvershoot,
                            Some(Duration::ZERO),
                        )
                    })?;
                    if finished {
                        debug!(runner = %self.id, target = scan.end, "final temperature already stable");
                        self.setpoints.lock().temperature = Some(scan.end);
                        break;
                    }

                    let step_direction = Direction::from_delta(temperature - previous);
                    for step in self.approach_ramp(previous, temperature)? {
                        self.set_temperature(step)?;
                        self.await_temperature(step, step_direction, ApproachMode::Fast)?;
                        self.settle(channels)?;
                    }
                    self.await_temperature(temperature, Direction::Steady, ApproachMode::NoOvershoot)?;
                    self.execute_all(&scan.children)?;
                    previous = temperature;
                }
            }
            ApproachMode::Sweep => {
                let program = sweep_program(&points, scan.sweep_rate, scan.spacing);
                self.call("program_temperature_sweep", |d| {
                    d.program_temperature_sweep(&program)
                })?;
                for &temperature in &points {
                    self.setpoints.lock().temperature = Some(temperature);
                    self.await_temperature(temperature, direction, ApproachMode::Sweep)?;
                    self.execute_all(&scan.children)?;
                }
            }
            other => {
                return Err(RunError::NotImplemented(format!(
                    "{other} approach for temperature scans"
                )));
            }
        }
        Ok(())
    }

    pub(super) fn execute_scan_field(&self, scan: &ScanField) -> RunResult<()> {
        let points = map_to_shape(|x| scan.spacing.shape(x), scan.start, scan.end, scan.n_steps)?;
        let direction = Direction::from_delta(scan.end - scan.start);
        debug!(runner = %self.id, ?points, approach = %scan.approach, "field scan");

        match scan.approach {
            ApproachMode::Linear | ApproachMode::Oscillate => {
                for &field in &points {
                    self.set_field(field, scan.end_mode)?;
                    self.await_field(field, direction, scan.approach)?;
                    self.execute_all(&scan.children)?;
                }
            }
            ApproachMode::NoOvershoot => {
                let channels = WaitChannels {
                    field: true,
                    ..WaitChannels::default()
                };
                let mut previous = points[0];
                for &field in &points {
                    for step in self.approach_ramp(previous, field)? {
                        self.set_field(step, EndMode::Driven)?;
                        self.settle(channels)?;
                    }
                    self.execute_all(&scan.children)?;
                    previous = field;
                }
            }
            ApproachMode::Sweep => {
                let program = sweep_program(&points, scan.sweep_rate, scan.spacing);
                self.call("program_field_sweep", |d| {
                    d.program_field_sweep(&program, scan.end_mode)
                })?;
                for &field in &points {
                    self.setpoints.lock().field = Some(field);
                    self.await_field(field, direction, ApproachMode::Sweep)?;
                    self.execute_all(&scan.children)?;
                }
            }
            other => {
                return Err(RunError::NotImplemented(format!(
                    "{other} approach for field scans"
                )));
            }
        }

        self.call("set_field_end_mode", |d| d.set_field_end_mode(scan.end_mode))
    }

    pub(super) fn execute_scan_position(&self, scan: &ScanPosition) -> RunResult<()> {
        let points = map_to_shape(|x| x, scan.start, scan.end, scan.n_steps)?;
        let direction = Direction::from_delta(scan.end - scan.start);
        debug!(runner = %self.id, ?points, approach = %scan.approach, "position scan");

        match scan.approach {
            ApproachMode::Pause => {
                let channels = WaitChannels {
                    position: true,
                    ..WaitChannels::default()
                };
                for &position in &points {
                    self.set_position(position, scan.speed_index)?;
                    self.wait(channels, 0.0)?;
                    self.execute_all(&scan.children)?;
                }
            }
            ApproachMode::Sweep => {
                let program = sweep_program(&points, 0.0, Spacing::Uniform);
                self.call("program_position_sweep", |d| {
                    d.program_position_sweep(&program, scan.speed_index)
                })?;
                for &position in &points {
                    self.setpoints.lock().position = Some(position);
                    self.await_position(position, direction, ApproachMode::Sweep)?;
                    self.execute_all(&scan.children)?;
                }
            }
            other => {
                return Err(RunError::NotImplemented(format!(
                    "{other} approach for position scans"
                )));
            }
        }
        Ok(())
    }

    pub(super) fn execute_scan_time(&self, scan: &ScanTime) -> RunResult<()> {
        if scan.total.abs() < ZERO_DURATION {
            info!(runner = %self.id, "time scan without duration; repeating until stopped");
            loop {
                self.check_running()?;
                if scan.children.is_empty() {
                    thread::sleep(self.config.poll_interval());
                }
                self.execute_all(&scan.children)?;
            }
        }

        let offsets = map_to_shape(|x| scan.spacing.shape(x), 0.0, scan.total, scan.n_steps)?;
        match self.config.time_scan {
            TimeScanPolicy::Elastic => self.execute_time_elastic(&offsets, &scan.children),
            TimeScanPolicy::Forced => self.execute_time_forced(&offsets, &scan.children),
        }
    }

    /// One repetition per offset; each period lasts the offset gap or the body, whichever is longer.
    fn execute_time_elastic(&self, offsets: &[f64], children: &[Command]) -> RunResult<()> {
        let step = self.config.wait_step().max(Duration::from_millis(1));
        for (i, offset) in offsets.iter().enumerate() {
            let timer = offsets.get(i + 1).map(|next| Timer::start(secs(next - offset)));
            self.execute_all(children)?;
            if let Some(timer) = timer {
                while !timer.is_finished() {
                    self.check_running()?;
                    thread::sleep(step);
                }
            }
        }
        Ok(())
    }

    /// One thread per offset, spawned when the offset comes due. Repetitions
    /// that overlap queue on the runner's gate.
    fn execute_time_forced(&self, offsets: &[f64], children: &[Command]) -> RunResult<()> {
        let start = Instant::now();
        let cancelled = AtomicBool::new(false);
        let step = self.config.wait_step().max(Duration::from_millis(1));

        let results: Vec<RunResult<()>> = thread::scope(|scope| {
            let mut pending = offsets.iter().map(|&offset| start + secs(offset)).peekable();
            let mut handles = Vec::with_capacity(offsets.len());

            loop {
                if self.check_running().is_err() {
                    cancelled.store(true, Ordering::SeqCst);
                    break;
                }
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }

                while pending.next_if(|due| *due <= Instant::now()).is_some() {
                    let cancelled = &cancelled;
                    debug!(runner = %self.id, repetition = handles.len(), "time scan repetition due");
                    handles.push(scope.spawn(move || -> RunResult<()> {
                        let _gate = self.gate.lock();
                        if cancelled.load(Ordering::SeqCst) {
                            return Ok(());
                        }
                        let result = self.execute_all(children);
                        if result.is_err() {
                            cancelled.store(true, Ordering::SeqCst);
                        }
                        result
                    }));
                }

                if pending.peek().is_none() && handles.iter().all(|h| h.is_finished()) {
                    break;
                }
                let until_next = pending
                    .peek()
                    .map_or(step, |due| due.saturating_duration_since(Instant::now()));
                thread::sleep(step.min(until_next));
            }

            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        self.check_running()?;
        results.into_iter().collect()
    }

    pub(super) fn execute_set_temperature(&self, set: &SetTemperature) -> RunResult<()> {
        if set.approach != ApproachMode::Fast && set.sweep_rate > 0.0 {
            let current = self.call("get_temperature", |d| d.get_temperature())?;
            let scan = ScanTemperature {
                start: current,
                end: set.temperature,
                sweep_rate: set.sweep_rate,
                n_steps: 2,
                spacing: Spacing::Uniform,
                approach: set.approach,
                children: Vec::new(),
                display: set.display.clone(),
            };
            return self.execute_scan_temperature(&scan);
        }
        self.set_temperature(set.temperature)
    }

    pub(super) fn execute_set_field(&self, set: &SetField) -> RunResult<()> {
        if set.approach != ApproachMode::Linear && set.sweep_rate > 0.0 {
            let current = self.call("get_field", |d| d.get_field())?;
            let scan = ScanField {
                start: current,
                end: set.field,
                sweep_rate: set.sweep_rate,
                n_steps: 2,
                spacing: Spacing::Uniform,
                approach: set.approach,
                end_mode: set.end_mode,
                children: Vec::new(),
                display: set.display.clone(),
            };
            return self.execute_scan_field(&scan);
        }
        self.set_field(set.field, set.end_mode)
    }
}

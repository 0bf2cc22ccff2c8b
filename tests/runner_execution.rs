//! Integration tests for sequence execution
//!
//! Runs parsed sequences against the dummy device and against partial
//! devices, checking call order, error recovery, and measurement storage.

use measure_seq::runner::{
    Aggregate, Device, DeviceError, DeviceResult, DummyDevice, Outcome, Reading, ReadingValue,
    RunError, RunnerConfig, SequenceRunner,
};
use measure_seq::sequence::{BridgeChannel, DataFlags, ParserOptions, parse_str};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn quick_config() -> RunnerConfig {
    RunnerConfig {
        poll_interval_secs: 0.001,
        wait_step_secs: 0.001,
        pause_poll_secs: 0.001,
        approach_settle_secs: 0.0,
        approach_steps: 3,
        ..RunnerConfig::default()
    }
}

fn dry_run(text: &str) -> (Outcome, Arc<DummyDevice>) {
    let device = Arc::new(DummyDevice::new());
    let parsed = parse_str(text, &ParserOptions::default()).unwrap();
    let runner = SequenceRunner::with_config(parsed, device.clone(), quick_config());
    (runner.run().unwrap(), device)
}

/// Device that only talks to the user; every capability is missing.
#[derive(Default)]
struct SilentDevice {
    messages: Mutex<Vec<String>>,
}

impl Device for SilentDevice {
    fn message_to_user(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Device whose temperature controller always fails.
#[derive(Default)]
struct FaultyDevice {
    messages: Mutex<Vec<String>>,
    shutdowns: Mutex<usize>,
}

impl Device for FaultyDevice {
    fn set_temperature(&self, _temperature: f64) -> DeviceResult<()> {
        Err(DeviceError::fault("timeout", "controller did not answer"))
    }

    fn shutdown(&self) -> DeviceResult<()> {
        *self.shutdowns.lock() += 1;
        Ok(())
    }

    fn message_to_user(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Bridge that loses its second channel after the first reading.
#[derive(Default)]
struct FlakyBridge {
    readings: Mutex<usize>,
    messages: Mutex<Vec<String>>,
    stored: Mutex<Vec<Aggregate>>,
}

impl Device for FlakyBridge {
    fn res_measure(&self, _dataflags: &DataFlags, _bridge: &[BridgeChannel]) -> DeviceResult<Reading> {
        let mut count = self.readings.lock();
        *count += 1;
        let mut reading = Reading::new();
        reading.insert("res1".to_string(), ReadingValue::Number(*count as f64));
        if *count == 1 {
            reading.insert("res2".to_string(), ReadingValue::Number(9.0));
        }
        Ok(reading)
    }

    fn measuring_store_data(&self, data: &Aggregate, _datafile: &str) -> DeviceResult<()> {
        self.stored.lock().push(data.clone());
        Ok(())
    }

    fn message_to_user(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

const MIXED: &str = "TMP TEMP 4,0,0\n\
                     SCAN T 4,8,1,3,0,0\n\
                     FLD FIELD 1,0.5,0,1\n\
                     ENDSCAN EOS\n\
                     CMB CHAMBER 2\n\
                     SHT SHUTDOWN";

#[test]
fn test_execution_is_deterministic() {
    let (first_outcome, first) = dry_run(MIXED);
    let (second_outcome, second) = dry_run(MIXED);
    assert_eq!(first_outcome, Outcome::Finished);
    assert_eq!(second_outcome, Outcome::Finished);
    assert_eq!(first.calls(), second.calls());
    assert_eq!(first.calls().first().map(String::as_str), Some("set_temperature(4)"));
    assert_eq!(first.calls().last().map(String::as_str), Some("shutdown()"));
}

#[test]
fn test_missing_capabilities_are_skipped() {
    let device = Arc::new(SilentDevice::default());
    let parsed = parse_str("SHT SHUTDOWN\nTMP TEMP 5,0,0\nREM done", &ParserOptions::default())
        .unwrap();
    let runner = SequenceRunner::with_config(parsed, device.clone(), quick_config());

    assert_eq!(runner.run().unwrap(), Outcome::Finished);
    let messages = device.messages.lock().clone();
    assert_eq!(messages.len(), 3);
    assert!(messages[0].contains("shutdown"));
    assert!(messages[1].contains("set_temperature"));
    assert_eq!(messages[2], "remark: done");
}

#[test]
fn test_beep_then_missing_shutdown_still_finishes() {
    let device = Arc::new(SilentDevice::default());
    let parsed = parse_str("BEP BEEP 0.01,440\nSHT SHUTDOWN", &ParserOptions::default()).unwrap();
    let runner = SequenceRunner::with_config(parsed, device.clone(), quick_config());

    assert_eq!(runner.run().unwrap(), Outcome::Finished);
    let messages = device.messages.lock().clone();
    assert!(messages.last().unwrap().contains("shutdown"));
}

#[test]
fn test_device_fault_is_reported_and_run_continues() {
    let device = Arc::new(FaultyDevice::default());
    let parsed = parse_str("TMP TEMP 5,0,0\nSHT SHUTDOWN", &ParserOptions::default()).unwrap();
    let runner = SequenceRunner::with_config(parsed, device.clone(), quick_config());

    assert_eq!(runner.run().unwrap(), Outcome::Finished);
    assert_eq!(*device.shutdowns.lock(), 1);
    let messages = device.messages.lock().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("timeout"));
    assert!(messages[0].contains("set_temperature"));
}

#[test]
fn test_structural_errors_end_the_run() {
    let device = Arc::new(DummyDevice::new());
    let parsed = parse_str("SCAN C 1,1,0\nENDSCAN EOS", &ParserOptions::default()).unwrap();
    let runner = SequenceRunner::with_config(parsed, device, quick_config());
    assert!(matches!(runner.run(), Err(RunError::Sequence(_))));
}

#[test]
fn test_resistivity_readings_are_aggregated() {
    let (outcome, device) = dry_run(
        "CDF \"cooldown.dat\" 0\n\
         RES 17,3,2,10,1,0,0,5,0,20,1,1,1,5,2,0.5,1,0,0,5,0,0,0,0,0,0",
    );
    assert_eq!(outcome, Outcome::Finished);

    let calls = device.calls();
    assert_eq!(calls.iter().filter(|c| c.starts_with("res_measure(")).count(), 3);

    let stored = device.stored();
    assert_eq!(stored.len(), 1);
    let (aggregate, datafile) = &stored[0];
    assert_eq!(datafile, "cooldown.dat");
    assert_eq!(aggregate.mean["res1"], 5.0);
    assert_eq!(aggregate.median["res2"], 8.0);
    assert_eq!(aggregate.stddev["exc1"], 0.0);
}

#[test]
fn test_missing_reading_field_is_reported() {
    let device = Arc::new(FlakyBridge::default());
    let parsed = parse_str(
        "RES 17,3,2,10,1,0,0,5,0,20,1,1,1,5,2,0.5,1,0,0,5,0,0,0,0,0,0",
        &ParserOptions::default(),
    )
    .unwrap();
    let runner = SequenceRunner::with_config(parsed, device.clone(), quick_config());

    assert_eq!(runner.run().unwrap(), Outcome::Finished);
    assert_eq!(*device.readings.lock(), 3);

    let messages = device.messages.lock().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("\"res2\""));
    assert!(messages[0].contains("resistivity measuring procedure"));

    let stored = device.stored.lock().clone();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].mean["res1"], 2.0);
    assert!(!stored[0].mean.contains_key("res2"));
}

#[test]
fn test_zero_readings_store_nothing() {
    let (_, device) = dry_run("RES 17,0,2,10,1,0,0,5,0,20,1,1,1,5,2,0.5,1,0,0,5,0,0,0,0,0,0");
    assert!(device.stored().is_empty());
    assert_eq!(device.messages().len(), 1);
}

#[test]
fn test_pause_and_resume() {
    let device = Arc::new(DummyDevice::new());
    let parsed = parse_str("WAITFOR 0.3,0,0,0,0\nSHT SHUTDOWN", &ParserOptions::default()).unwrap();
    let runner = Arc::new(SequenceRunner::with_config(parsed, device.clone(), quick_config()));

    let worker = {
        let runner = Arc::clone(&runner);
        thread::spawn(move || runner.run())
    };

    runner.pause();
    assert!(runner.is_paused());
    thread::sleep(Duration::from_millis(400));
    assert!(device.calls().is_empty());

    runner.resume();
    assert_eq!(worker.join().unwrap().unwrap(), Outcome::Finished);
    assert_eq!(device.calls(), vec!["shutdown()"]);
}

#[test]
fn test_stop_interrupts_a_long_wait() {
    let device = Arc::new(DummyDevice::new());
    let parsed = parse_str("WAITFOR 30,0,0,0,0\nSHT SHUTDOWN", &ParserOptions::default()).unwrap();
    let runner = Arc::new(SequenceRunner::with_config(parsed, device.clone(), quick_config()));

    let worker = {
        let runner = Arc::clone(&runner);
        thread::spawn(move || runner.run())
    };

    thread::sleep(Duration::from_millis(50));
    runner.stop();
    assert_eq!(worker.join().unwrap().unwrap(), Outcome::Aborted);
    assert!(device.calls().is_empty());
    assert!(!runner.is_running());
}

#[test]
fn test_endless_time_scan_runs_until_stopped() {
    let device = Arc::new(DummyDevice::new());
    let parsed = parse_str(
        "SCAN C 0,3,0\nWAITFOR 0.01,0,0,0,0\nSHT SHUTDOWN\nENDSCAN EOS",
        &ParserOptions::default(),
    )
    .unwrap();
    let runner = Arc::new(SequenceRunner::with_config(parsed, device.clone(), quick_config()));

    let worker = {
        let runner = Arc::clone(&runner);
        thread::spawn(move || runner.run())
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while device.calls().len() < 3 {
        assert!(Instant::now() < deadline, "time scan stopped repeating");
        thread::sleep(Duration::from_millis(5));
    }

    runner.stop();
    assert_eq!(worker.join().unwrap().unwrap(), Outcome::Aborted);
    let calls = device.calls();
    assert!(calls.len() >= 3);
    assert!(calls.iter().all(|c| c == "shutdown()"));
}

//! End-to-end: simulator state checkpointed in memory and written as
//! restart steps, then recovered from both.

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use opm_common::{
    persisted_eq, Bitset, ERst, EnvelopeError, Error, Field, MemPacker, PackError, Restart, RestartConfig, Result,
    ResultSet, Serializer, TimePoint,
};
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ReservoirState {
    time: TimePoint,
    report_step: i32,
    pressure: Vec<f64>,
    saturation: Vec<f32>,
    active: Vec<bool>,
    well_names: Vec<String>,
    phases: Bitset<3>,
}

impl Field for ReservoirState {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> opm_common::serialization::Result<()> {
        s.field(&mut self.time)?;
        s.field(&mut self.report_step)?;
        s.field(&mut self.pressure)?;
        s.field(&mut self.saturation)?;
        s.field(&mut self.active)?;
        s.field(&mut self.well_names)?;
        s.field(&mut self.phases)
    }
}

impl ReservoirState {
    fn at_step(step: i32) -> Self {
        let start = Utc.with_ymd_and_hms(1997, 11, 6, 0, 0, 0).unwrap();
        ReservoirState {
            time: start + Duration::days(30 * i64::from(step)),
            report_step: step,
            pressure: (0..12).map(|i| 250.0 + f64::from(i) - f64::from(step) * 0.5).collect(),
            saturation: (0..12).map(|i| 0.2 + i as f32 * 0.05).collect(),
            active: (0..12).map(|i| i % 5 != 0).collect(),
            well_names: vec!["B-2H".to_string(), "D-1H".to_string(), "C-4AH".to_string()],
            phases: Bitset::from_u64(0b101),
        }
    }

    /// Day, month, year, second of day and phase mask.
    fn intehead(&self) -> [i32; 5] {
        let mut head = [0; 5];
        head[IH_DAY] = self.time.day() as i32;
        head[IH_MONTH] = self.time.month() as i32;
        head[IH_YEAR] = self.time.year();
        head[IH_SECOND] = self.time.num_seconds_from_midnight() as i32;
        head[IH_PHASES] = self.phases.to_u64() as i32;
        head
    }

    fn write_restart(&self, restart: &mut Restart) -> Result<()> {
        restart.prepare_step(self.report_step)?;
        restart.write("INTEHEAD", &self.intehead())?;
        restart.write("PRESSURE", &self.pressure)?;
        restart.write("SWAT", &self.saturation)?;
        restart.write("ACTIVE", &self.active)?;
        restart.write("ZWEL", &self.well_names)?;
        restart.message("ENDSOL")?;
        Ok(())
    }

    fn read_restart(rst: &mut ERst, step: i32) -> Result<Self> {
        rst.load_report_step_number(step)?;
        let head = rst.get_rst::<i32>("INTEHEAD", step)?;
        Ok(ReservoirState {
            time: time_from_intehead(head),
            report_step: step,
            pressure: rst.get_rst::<f64>("PRESSURE", step)?.to_vec(),
            saturation: rst.get_rst::<f32>("SWAT", step)?.to_vec(),
            active: rst.get_rst::<bool>("ACTIVE", step)?.to_vec(),
            well_names: rst.get_rst::<String>("ZWEL", step)?.to_vec(),
            phases: Bitset::from_u64(head[IH_PHASES] as u64),
        })
    }
}

const IH_DAY: usize = 0;
const IH_MONTH: usize = 1;
const IH_YEAR: usize = 2;
const IH_SECOND: usize = 3;
const IH_PHASES: usize = 4;

fn time_from_intehead(head: &[i32]) -> TimePoint {
    NaiveDate::from_ymd_opt(head[IH_YEAR], head[IH_MONTH] as u32, head[IH_DAY] as u32)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight) + Duration::seconds(i64::from(head[IH_SECOND])))
        .unwrap_or_default()
}

#[test]
fn checkpoint_round_trip_through_envelope() -> Result<()> {
    init_tracing();
    let packer = MemPacker::new();
    let mut state = ReservoirState::at_step(3);

    let sealed = packer.pack_sealed(&mut state)?;
    let mut restored: ReservoirState = packer.unpack_sealed(&sealed)?;

    assert_eq!(restored, state);
    assert!(persisted_eq(&mut restored, &mut state)?);
    Ok(())
}

#[test]
fn corrupted_checkpoint_is_rejected() -> Result<()> {
    let packer = MemPacker::new();
    let mut state = ReservoirState::at_step(1);
    let mut sealed = packer.pack_sealed(&mut state)?;
    let last = sealed.len() - 1;
    sealed[last] ^= 0xFF;

    let err: Error = packer.unpack_sealed::<ReservoirState>(&sealed).unwrap_err().into();
    assert!(matches!(
        err,
        Error::Pack(PackError::Envelope(EnvelopeError::ChecksumMismatch { .. }))
    ));
    Ok(())
}

#[test]
fn restart_steps_recover_state() -> Result<()> {
    init_tracing();
    let dir = tempdir().unwrap();
    let rset = ResultSet::new(dir.path(), "NORNE_ATW2013");
    let states: Vec<ReservoirState> = (1..=4).map(ReservoirState::at_step).collect();

    {
        let mut restart = Restart::new(rset.clone(), RestartConfig::unified_binary());
        for state in &states {
            state.write_restart(&mut restart)?;
        }
        restart.close()?;
    }

    let mut rst = ERst::open(dir.path().join("NORNE_ATW2013.UNRST"))?;
    assert_eq!(rst.list_of_report_step_numbers(), vec![1, 2, 3, 4]);
    for state in &states {
        let mut read = ReservoirState::read_restart(&mut rst, state.report_step)?;
        let mut expected = state.clone();
        assert!(persisted_eq(&mut read, &mut expected)?, "step {}", state.report_step);
    }
    Ok(())
}

#[test]
fn restarted_run_rewrites_history() -> Result<()> {
    init_tracing();
    let dir = tempdir().unwrap();
    let rset = ResultSet::new(dir.path(), "CASE");

    {
        let mut restart = Restart::new(rset.clone(), RestartConfig::unified_formatted());
        for step in 1..=4 {
            ReservoirState::at_step(step).write_restart(&mut restart)?;
        }
    }

    // a second run restarts from step 2 and writes a different step 3
    let mut rewritten = ReservoirState::at_step(3);
    rewritten.pressure.iter_mut().for_each(|p| *p += 10.0);
    {
        let mut restart = Restart::new(rset.clone(), RestartConfig::unified_formatted());
        rewritten.write_restart(&mut restart)?;
    }

    let mut rst = ERst::open(dir.path().join("CASE.FUNRST"))?;
    assert_eq!(rst.list_of_report_step_numbers(), vec![1, 2, 3]);
    let read = ReservoirState::read_restart(&mut rst, 3)?;
    for (a, b) in read.pressure.iter().zip(&rewritten.pressure) {
        assert!((a - b).abs() < 1e-9);
    }
    Ok(())
}

#[test]
fn restart_dates_past_2038_survive() -> Result<()> {
    let dir = tempdir().unwrap();
    let mut state = ReservoirState::at_step(2);
    state.time = Utc.with_ymd_and_hms(2071, 3, 14, 15, 9, 26).unwrap();
    {
        let mut restart = Restart::new(ResultSet::new(dir.path(), "LATE"), RestartConfig::unified_binary());
        state.write_restart(&mut restart)?;
    }

    let mut rst = ERst::open(dir.path().join("LATE.UNRST"))?;
    let mut read = ReservoirState::read_restart(&mut rst, 2)?;
    assert_eq!(read.time, state.time);
    assert!(persisted_eq(&mut read, &mut state)?);
    Ok(())
}

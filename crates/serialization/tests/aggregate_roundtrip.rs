//! Round-trips of nested simulator aggregates through MemPacker

use std::collections::{BTreeMap, HashMap};

use chrono::{TimeZone, Utc};
use opm_serialization::{
    assert_round_trip, compare_persisted, Bitset, Comparison, Field, MemPacker, PackError, Result,
    SerializationTestObject, Serializer, TimePoint,
};
use thiserror::Error;

// ============================================================================
// Test aggregates
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum IcdStatus {
    #[default]
    Open,
    Shut,
}

impl Field for IcdStatus {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        let tag = s.size_tag(*self as usize)?;
        if s.is_unpacking() {
            *self = match tag {
                0 => IcdStatus::Open,
                1 => IcdStatus::Shut,
                tag => {
                    return Err(PackError::UnknownDiscriminant {
                        tag,
                        type_name: "IcdStatus",
                    })
                }
            };
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
enum SicdError {
    #[error("Scaling factor for segment {0} has not been computed")]
    NotComputed(i32),
}

/// Spiral inflow control device on one segment
#[derive(Debug, Clone, Default, PartialEq)]
struct Sicd {
    segment: i32,
    strength: f64,
    length: f64,
    density_calibration: f64,
    viscosity_calibration: f64,
    critical_value: f64,
    width_transition: f64,
    max_viscosity_ratio: f64,
    method_flow_scaling: i32,
    max_absolute_rate: Option<f64>,
    status: IcdStatus,
    scaling_factor: Option<f64>,
}

impl Sicd {
    fn scaling_factor(&self) -> std::result::Result<f64, SicdError> {
        self.scaling_factor.ok_or(SicdError::NotComputed(self.segment))
    }

    fn update_scaling_factor(&mut self, outlet_length: f64, completion_length: f64) {
        let factor = match self.method_flow_scaling {
            0 => self.length / outlet_length,
            1 => self.length.abs(),
            _ => completion_length / outlet_length,
        };
        self.scaling_factor = Some(factor);
    }
}

impl Field for Sicd {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.field(&mut self.segment)?;
        s.field(&mut self.strength)?;
        s.field(&mut self.length)?;
        s.field(&mut self.density_calibration)?;
        s.field(&mut self.viscosity_calibration)?;
        s.field(&mut self.critical_value)?;
        s.field(&mut self.width_transition)?;
        s.field(&mut self.max_viscosity_ratio)?;
        s.field(&mut self.method_flow_scaling)?;
        s.field(&mut self.max_absolute_rate)?;
        s.field(&mut self.status)?;
        s.field(&mut self.scaling_factor)
    }
}

impl SerializationTestObject for Sicd {
    fn serialization_test_object() -> Self {
        Sicd {
            segment: 7,
            strength: 0.001,
            length: -0.7,
            density_calibration: 1000.25,
            viscosity_calibration: 1.45,
            critical_value: 0.6,
            width_transition: 0.05,
            max_viscosity_ratio: 5.0,
            method_flow_scaling: 1,
            max_absolute_rate: Some(250.0),
            status: IcdStatus::Shut,
            scaling_factor: Some(0.7),
        }
    }
}

/// Well state at a report step
#[derive(Debug, Clone, Default, PartialEq)]
struct WellState {
    name: String,
    opened: TimePoint,
    controls: Bitset<12>,
    devices: BTreeMap<String, Vec<(i32, Sicd)>>,
    rates: HashMap<String, f64>,
    history: Vec<Vec<f32>>,
}

impl Field for WellState {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.field(&mut self.name)?;
        s.field(&mut self.opened)?;
        s.field(&mut self.controls)?;
        s.field(&mut self.devices)?;
        s.field(&mut self.rates)?;
        s.field(&mut self.history)
    }
}

impl SerializationTestObject for WellState {
    fn serialization_test_object() -> Self {
        let mut devices = BTreeMap::new();
        devices.insert(
            "BRANCH1".to_string(),
            vec![(3, Sicd::serialization_test_object()), (4, Sicd::default())],
        );
        devices.insert("BRANCH2".to_string(), Vec::new());

        let mut rates = HashMap::new();
        rates.insert("ORAT".to_string(), 1200.5);
        rates.insert("WRAT".to_string(), 30.0);
        rates.insert("GRAT".to_string(), 0.0);

        WellState {
            name: "PROD-1".into(),
            opened: Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap(),
            controls: Bitset::from(0b1010_0000_0101),
            devices,
            rates,
            history: vec![vec![1.0, 2.0], vec![], vec![f32::MAX]],
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_sicd_round_trip() {
    assert_round_trip::<Sicd>();
}

#[test]
fn test_well_state_round_trip() {
    assert_round_trip::<WellState>();
}

#[test]
fn test_scaling_factor_not_computed() {
    let mut sicd = Sicd {
        segment: 12,
        length: 6.0,
        ..Sicd::default()
    };
    assert_eq!(sicd.scaling_factor(), Err(SicdError::NotComputed(12)));

    sicd.update_scaling_factor(3.0, 10.0);
    assert_eq!(sicd.scaling_factor(), Ok(2.0));
}

#[test]
fn test_not_computed_survives_round_trip() {
    let packer = MemPacker::new();
    let mut sicd = Sicd {
        segment: 2,
        ..Sicd::default()
    };
    let bytes = packer.pack_object(&mut sicd).unwrap();
    let out: Sicd = packer.unpack_object(&bytes).unwrap();
    assert!(out.scaling_factor().is_err());
}

#[test]
fn test_unknown_discriminant() {
    let packer = MemPacker::new();
    let mut tag = 5usize;
    let bytes = packer.pack_object(&mut tag).unwrap();

    let err = packer.unpack_object::<IcdStatus>(&bytes).unwrap_err();
    assert_eq!(
        err,
        PackError::UnknownDiscriminant {
            tag: 5,
            type_name: "IcdStatus"
        }
    );
}

#[test]
fn test_equality_pinpoints_changed_device() {
    let mut a = WellState::serialization_test_object();
    let mut b = a.clone();
    if let Some(list) = b.devices.get_mut("BRANCH1") {
        list[0].1.strength = 0.002;
    }

    match compare_persisted(&mut a, &mut b).unwrap() {
        Comparison::Differ(d) => assert!(d.offset > 0),
        Comparison::Equal => panic!("expected a difference"),
    }
}

#[test]
fn test_checkpoint_sequence_in_one_buffer() {
    let packer = MemPacker::new();
    let mut first = WellState::serialization_test_object();
    let mut second = Sicd::serialization_test_object();

    let mut buffer = Vec::new();
    let mut position = 0;
    packer.pack_into(&mut first, &mut buffer, &mut position).unwrap();
    packer.pack_into(&mut second, &mut buffer, &mut position).unwrap();
    assert_eq!(buffer.len(), position);

    let mut out_first = WellState::default();
    let mut out_second = Sicd::default();
    let mut read_pos = 0;
    packer.unpack_into(&mut out_first, &buffer, &mut read_pos).unwrap();
    packer.unpack_into(&mut out_second, &buffer, &mut read_pos).unwrap();

    assert_eq!(out_first, first);
    assert_eq!(out_second, second);
    assert_eq!(read_pos, position);
}

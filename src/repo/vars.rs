//! Status variable registry
//!
//! The compile-time enumeration indexing the status table, plus the
//! definition table carrying each variable's name and default value.
//! Name lookups serve the shell and telemetry front-ends; the defaults
//! are written when the repository is initialized with `drop`.

use crate::storage::value::Value32;

/// Number of per-payload write-index counters reserved in the table.
pub const MAX_PAYLOAD_COUNTERS: usize = 8;

/// Logical index of a status variable.
///
/// The discriminant is the slot index in the status table; physical
/// placement (one or three copies) is the table's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusAddress {
    /// Operating mode flag
    ObcOpMode = 0,
    /// Cause of the last reset
    ObcLastReset,
    /// Hours alive since launch
    ObcHoursAlive,
    /// Hours since the last reset
    ObcHoursWithoutReset,
    /// Reset counter
    ObcResetCounter,
    /// Software watchdog period in seconds
    ObcSwWdt,
    /// On-board temperature
    ObcTempBoard,
    /// RTC date and time (unixtime)
    RtcDateTime,
    /// Angular rate around X (rad/s)
    AdsOmegaX,
    /// Angular rate around Y (rad/s)
    AdsOmegaY,
    /// Angular rate around Z (rad/s)
    AdsOmegaZ,
    /// Attitude quaternion, vector part i
    AdsQ0,
    /// Attitude quaternion, vector part j
    AdsQ1,
    /// Attitude quaternion, vector part k
    AdsQ2,
    /// Attitude quaternion, scalar part
    AdsQ3,
    /// Unixtime of the last flight-plan execution
    FplLast,
    /// Number of live flight-plan entries
    FplQueue,
    /// Next write index of payload 0
    DrpIdx0,
    /// Next write index of payload 1
    DrpIdx1,
    /// Next write index of payload 2
    DrpIdx2,
    /// Next write index of payload 3
    DrpIdx3,
    /// Next write index of payload 4
    DrpIdx4,
    /// Next write index of payload 5
    DrpIdx5,
    /// Next write index of payload 6
    DrpIdx6,
    /// Next write index of payload 7
    DrpIdx7,
}

impl StatusAddress {
    /// Number of status variables.
    pub const COUNT: usize = 25;

    /// Slot index in the status table.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Write-index counter of payload `payload`.
    pub fn payload_index(payload: usize) -> Option<StatusAddress> {
        use StatusAddress::*;
        match payload {
            0 => Some(DrpIdx0),
            1 => Some(DrpIdx1),
            2 => Some(DrpIdx2),
            3 => Some(DrpIdx3),
            4 => Some(DrpIdx4),
            5 => Some(DrpIdx5),
            6 => Some(DrpIdx6),
            7 => Some(DrpIdx7),
            _ => None,
        }
    }
}

/// Definition of one status variable.
#[derive(Debug, Clone, Copy)]
pub struct StatusVarDef {
    pub address: StatusAddress,
    pub name: &'static str,
    pub default: Value32,
}

const fn def(address: StatusAddress, name: &'static str, default: Value32) -> StatusVarDef {
    StatusVarDef {
        address,
        name,
        default,
    }
}

/// Definition table, ordered by slot index.
pub static STATUS_VAR_DEFS: [StatusVarDef; StatusAddress::COUNT] = {
    use StatusAddress::*;
    [
        def(ObcOpMode, "obc_opmode", Value32::ZERO),
        def(ObcLastReset, "obc_last_reset", Value32::ZERO),
        def(ObcHoursAlive, "obc_hrs_alive", Value32::ZERO),
        def(ObcHoursWithoutReset, "obc_hrs_wo_reset", Value32::ZERO),
        def(ObcResetCounter, "obc_reset_counter", Value32::ZERO),
        def(ObcSwWdt, "obc_sw_wdt", Value32::from_int(120)),
        def(ObcTempBoard, "obc_temp_1", Value32::ZERO),
        def(RtcDateTime, "rtc_date_time", Value32::ZERO),
        def(AdsOmegaX, "ads_omega_x", Value32::ZERO),
        def(AdsOmegaY, "ads_omega_y", Value32::ZERO),
        def(AdsOmegaZ, "ads_omega_z", Value32::ZERO),
        def(AdsQ0, "ads_q0", Value32::ZERO),
        def(AdsQ1, "ads_q1", Value32::ZERO),
        def(AdsQ2, "ads_q2", Value32::ZERO),
        def(AdsQ3, "ads_q3", Value32::ZERO),
        def(FplLast, "fpl_last", Value32::ZERO),
        def(FplQueue, "fpl_queue", Value32::ZERO),
        def(DrpIdx0, "drp_idx_0", Value32::ZERO),
        def(DrpIdx1, "drp_idx_1", Value32::ZERO),
        def(DrpIdx2, "drp_idx_2", Value32::ZERO),
        def(DrpIdx3, "drp_idx_3", Value32::ZERO),
        def(DrpIdx4, "drp_idx_4", Value32::ZERO),
        def(DrpIdx5, "drp_idx_5", Value32::ZERO),
        def(DrpIdx6, "drp_idx_6", Value32::ZERO),
        def(DrpIdx7, "drp_idx_7", Value32::ZERO),
    ]
};

/// Look a variable definition up by name.
pub fn var_by_name(name: &str) -> Option<&'static StatusVarDef> {
    STATUS_VAR_DEFS.iter().find(|def| def.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defs_cover_every_slot_in_order() {
        assert_eq!(STATUS_VAR_DEFS.len(), StatusAddress::COUNT);
        for (i, def) in STATUS_VAR_DEFS.iter().enumerate() {
            assert_eq!(def.address.index(), i);
        }
    }

    #[test]
    fn name_lookup() {
        assert_eq!(
            var_by_name("fpl_queue").map(|d| d.address),
            Some(StatusAddress::FplQueue)
        );
        assert!(var_by_name("no_such_var").is_none());
    }

    #[test]
    fn payload_counters_are_contiguous() {
        for p in 0..MAX_PAYLOAD_COUNTERS {
            let addr = StatusAddress::payload_index(p).unwrap();
            assert_eq!(addr.index(), StatusAddress::DrpIdx0.index() + p);
        }
        assert!(StatusAddress::payload_index(MAX_PAYLOAD_COUNTERS).is_none());
    }

    #[test]
    fn quaternion_run_is_contiguous() {
        assert_eq!(
            StatusAddress::AdsQ3.index(),
            StatusAddress::AdsQ0.index() + 3
        );
    }
}

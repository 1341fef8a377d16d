// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Sign-in status bytes. The numeric values are part of the wire contract;
//! the retail client maps each of them to a localized error screen.

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SignCode {
    Unknown = 0,
    Success,
    /// Authentication server communication failed.
    Failed,
    /// Incorrect input, authentication has been suspended.
    Illegal,
    /// Authentication server process error.
    Alert,
    /// Internal procedure ended abnormally.
    Abort,
    /// Abnormal certification report.
    Response,
    /// Database connection failed.
    Database,
    Absence,
    Resign,
    SuspendD,
    Lock,
    Pass,
    Right,
    Auth,
    /// Account temporarily suspended.
    Suspend,
    /// Account permanently suspended.
    Eliminate,
    Close,
    /// Login process congested, retry later.
    CloseEx,
    Interval,
    Moved,
    NotReady,
    Already,
    /// Region blocked by IP address.
    IpAddr,
    Hangame,
    UpdateOnly,
    MemberId,
    CogCode,
    Token,
    CogLink,
    Maintenance,
    MaintenanceNoUpdate,
    Unk32,
    Unk33,
    Unk34,
    Unk35,
    XbResponse,
    Psi,
    MemberIdPsi,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_stable() {
        assert_eq!(u8::from(SignCode::Unknown), 0);
        assert_eq!(u8::from(SignCode::Success), 1);
        assert_eq!(u8::from(SignCode::Database), 7);
        assert_eq!(u8::from(SignCode::Pass), 12);
        assert_eq!(u8::from(SignCode::Auth), 14);
        assert_eq!(u8::from(SignCode::MemberIdPsi), 38);
    }

    #[test]
    fn roundtrip_through_u8() {
        let code = SignCode::try_from(12u8).unwrap();
        assert_eq!(code, SignCode::Pass);
        assert!(SignCode::try_from(250u8).is_err());
    }
}

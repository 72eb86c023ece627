//! Token hardware profiles.
//!
//! A [`TokenProfile`] describes how one family of token boards is reached
//! over BLE: which GATT service and characteristics carry the serial link,
//! and how messages are framed on it. The host resolves a discovered
//! peripheral to a profile, binds a [`BleTransport`](anyboard_core::BleTransport)
//! to the listed characteristics, and passes both to
//! [`GtTokenBuilder`](crate::GtTokenBuilder).
//!
//! | Profile | Framing | Write restriction         | Service UUID prefix |
//! |---------|---------|---------------------------|---------------------|
//! | Bean    | GT      | one packet per message    | `a495ff10`          |
//! | RFduino | Raw     | at most 20 bytes per write| `00002220`          |

/// How messages are laid out on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// GT header byte per packet plus a checksummed envelope, with
    /// multi-packet reassembly.
    Gt,
    /// Payload written as-is in a single packet; every notification is one
    /// complete message.
    Raw,
}

/// Static description of a token board family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenProfile {
    /// Human-readable family name (e.g. "Bean").
    pub name: &'static str,
    /// GATT service carrying the serial link.
    pub service_uuid: &'static str,
    /// Characteristic the host writes packets to.
    pub write_characteristic_uuid: &'static str,
    /// Characteristic the token notifies on.
    pub notify_characteristic_uuid: &'static str,
    /// Client characteristic configuration descriptor written to enable
    /// notifications, when the stack needs it spelled out.
    pub descriptor_uuid: Option<&'static str>,
    /// Message framing used on the link.
    pub framing: Framing,
    /// The board only accepts messages that fit in one packet, so longer
    /// application data is split before framing.
    pub single_packet_write: bool,
}

/// LightBlue Bean boards: GT framing over the Bean serial characteristic.
pub fn bean() -> TokenProfile {
    TokenProfile {
        name: "Bean",
        service_uuid: "a495ff10-c5b1-4b44-b512-1370f02d74de",
        write_characteristic_uuid: "a495ff11-c5b1-4b44-b512-1370f02d74de",
        notify_characteristic_uuid: "a495ff11-c5b1-4b44-b512-1370f02d74de",
        descriptor_uuid: Some("00002902-0000-1000-8000-00805f9b34fb"),
        framing: Framing::Gt,
        single_packet_write: true,
    }
}

/// RFduino boards: unframed packets on separate write and notify
/// characteristics.
pub fn rfduino() -> TokenProfile {
    TokenProfile {
        name: "RFduino",
        service_uuid: "00002220-0000-1000-8000-00805f9b34fb",
        write_characteristic_uuid: "00002222-0000-1000-8000-00805f9b34fb",
        notify_characteristic_uuid: "00002221-0000-1000-8000-00805f9b34fb",
        descriptor_uuid: None,
        framing: Framing::Raw,
        single_packet_write: true,
    }
}

/// Every known profile.
pub fn all_profiles() -> Vec<TokenProfile> {
    vec![bean(), rfduino()]
}

/// Find the profile advertising `service_uuid` (case-insensitive).
pub fn profile_for_service(service_uuid: &str) -> Option<TokenProfile> {
    all_profiles()
        .into_iter()
        .find(|p| p.service_uuid.eq_ignore_ascii_case(service_uuid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bean_uses_gt_framing() {
        let p = bean();
        assert_eq!(p.framing, Framing::Gt);
        assert!(p.single_packet_write);
        assert_eq!(p.write_characteristic_uuid, p.notify_characteristic_uuid);
        assert!(p.descriptor_uuid.is_some());
    }

    #[test]
    fn rfduino_uses_raw_framing() {
        let p = rfduino();
        assert_eq!(p.framing, Framing::Raw);
        assert_ne!(p.write_characteristic_uuid, p.notify_characteristic_uuid);
    }

    #[test]
    fn lookup_by_service() {
        let p = profile_for_service("A495FF10-C5B1-4B44-B512-1370F02D74DE").unwrap();
        assert_eq!(p.name, "Bean");
        assert_eq!(
            profile_for_service("00002220-0000-1000-8000-00805f9b34fb")
                .unwrap()
                .name,
            "RFduino"
        );
        assert!(profile_for_service("0000180f-0000-1000-8000-00805f9b34fb").is_none());
    }

    #[test]
    fn profile_names_unique() {
        let profiles = all_profiles();
        assert_eq!(profiles.len(), 2);
        assert_ne!(profiles[0].name, profiles[1].name);
    }
}

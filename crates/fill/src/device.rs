//! Device and ROM detection, and the per-ROM quirks derived from it.
//!
//! Vendor ROMs differ in how reliably they deliver delayed save prompts and
//! in how long the platform waits for a fill response. Detection works off
//! build strings and the presence of vendor system properties, both supplied
//! by the platform bridge as a [`BuildInfo`].

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::save::FLAG_SAVE_ON_ALL_VIEWS_INVISIBLE;

/// OS API level of Android 9, the first with dependable delayed save prompts.
const API_DELAYED_SAVE: u32 = 28;
const API_INLINE_SUGGESTIONS: u32 = 30;
const API_INLINE_ON_VENDOR_ROMS: u32 = 31;
const API_HYPER_OS: u32 = 34;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Manufacturer {
    Xiaomi,
    Oppo,
    OnePlus,
    Realme,
    Vivo,
    Huawei,
    Honor,
    Samsung,
    Google,
    Meizu,
    Lenovo,
    Zte,
    Nubia,
    #[default]
    Other,
}

impl Manufacturer {
    /// Classify from the build manufacturer and brand strings.
    pub fn detect(manufacturer: &str, brand: &str) -> Self {
        let m = manufacturer.to_lowercase();
        let b = brand.to_lowercase();
        let either = |needle: &str| m.contains(needle) || b.contains(needle);

        if either("xiaomi") || b.contains("redmi") || b.contains("poco") {
            Manufacturer::Xiaomi
        } else if either("oppo") {
            Manufacturer::Oppo
        } else if either("oneplus") {
            Manufacturer::OnePlus
        } else if either("realme") {
            Manufacturer::Realme
        } else if either("vivo") || b.contains("iqoo") {
            Manufacturer::Vivo
        } else if either("huawei") {
            Manufacturer::Huawei
        } else if either("honor") {
            Manufacturer::Honor
        } else if m.contains("samsung") {
            Manufacturer::Samsung
        } else if m.contains("google") {
            Manufacturer::Google
        } else if either("meizu") {
            Manufacturer::Meizu
        } else if m.contains("lenovo") || m.contains("motorola") {
            Manufacturer::Lenovo
        } else if m.contains("zte") {
            Manufacturer::Zte
        } else if m.contains("nubia") {
            Manufacturer::Nubia
        } else {
            Manufacturer::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RomFamily {
    Miui,
    HyperOs,
    ColorOs,
    OxygenOs,
    RealmeUi,
    OriginOs,
    FuntouchOs,
    Emui,
    HarmonyOs,
    MagicOs,
    OneUi,
    Flyme,
    StockAndroid,
    #[default]
    Other,
}

impl fmt::Display for RomFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RomFamily::Miui => "MIUI",
            RomFamily::HyperOs => "HyperOS",
            RomFamily::ColorOs => "ColorOS",
            RomFamily::OxygenOs => "OxygenOS",
            RomFamily::RealmeUi => "Realme UI",
            RomFamily::OriginOs => "OriginOS",
            RomFamily::FuntouchOs => "Funtouch OS",
            RomFamily::Emui => "EMUI",
            RomFamily::HarmonyOs => "HarmonyOS",
            RomFamily::MagicOs => "MagicOS",
            RomFamily::OneUi => "One UI",
            RomFamily::Flyme => "Flyme",
            RomFamily::StockAndroid => "Stock Android",
            RomFamily::Other => "Other",
        };
        f.write_str(name)
    }
}

/// Raw build facts reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub api_level: u32,
    #[serde(default)]
    pub release: String,
    /// Vendor system properties that are set, by name.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl BuildInfo {
    fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }
}

/// What the core needs to know about the device it runs on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub manufacturer: Manufacturer,
    pub rom: RomFamily,
    pub rom_version: String,
    pub api_level: u32,
    pub supports_inline_suggestions: bool,
}

impl DeviceProfile {
    pub fn new(manufacturer: Manufacturer, rom: RomFamily, api_level: u32) -> Self {
        Self {
            manufacturer,
            rom,
            rom_version: String::new(),
            api_level,
            supports_inline_suggestions: inline_support(rom, api_level),
        }
    }

    /// A stock device at `api_level`.
    pub fn stock(api_level: u32) -> Self {
        Self::new(Manufacturer::Google, RomFamily::StockAndroid, api_level)
    }

    pub fn detect(build: &BuildInfo) -> Self {
        let manufacturer = Manufacturer::detect(&build.manufacturer, &build.brand);
        let rom = detect_rom(manufacturer, build);
        let profile = Self {
            manufacturer,
            rom,
            rom_version: rom_version(rom, build),
            api_level: build.api_level,
            supports_inline_suggestions: inline_support(rom, build.api_level),
        };
        tracing::debug!(
            category = "filling",
            manufacturer = ?profile.manufacturer,
            rom = %profile.rom,
            rom_version = %profile.rom_version,
            api_level = profile.api_level,
            "device profile detected"
        );
        profile
    }

    /// Whether the ROM reliably shows a save prompt after the form disappears.
    pub fn supports_delayed_save_prompt(&self) -> bool {
        match self.rom {
            RomFamily::Miui | RomFamily::HyperOs | RomFamily::OriginOs | RomFamily::FuntouchOs => {
                false
            }
            RomFamily::ColorOs
            | RomFamily::OxygenOs
            | RomFamily::RealmeUi
            | RomFamily::OneUi
            | RomFamily::StockAndroid
            | RomFamily::HarmonyOs
            | RomFamily::Emui => true,
            RomFamily::MagicOs | RomFamily::Flyme | RomFamily::Other => {
                self.api_level >= API_DELAYED_SAVE
            }
        }
    }

    /// Save flags for descriptors built on this device.
    pub fn recommended_save_flags(&self) -> u32 {
        match self.rom {
            RomFamily::Miui | RomFamily::HyperOs | RomFamily::OriginOs | RomFamily::FuntouchOs => 0,
            RomFamily::ColorOs
            | RomFamily::OxygenOs
            | RomFamily::RealmeUi
            | RomFamily::OneUi
            | RomFamily::StockAndroid
            | RomFamily::HarmonyOs
            | RomFamily::Emui
            | RomFamily::MagicOs
            | RomFamily::Flyme
            | RomFamily::Other => FLAG_SAVE_ON_ALL_VIEWS_INVISIBLE,
        }
    }

    /// Deadline for one fill request on this ROM.
    pub fn recommended_timeout(&self) -> Duration {
        let millis = match self.rom {
            RomFamily::Miui | RomFamily::HyperOs => 3000,
            RomFamily::ColorOs | RomFamily::OxygenOs | RomFamily::RealmeUi => 4500,
            RomFamily::OriginOs | RomFamily::FuntouchOs => 2500,
            RomFamily::HarmonyOs | RomFamily::Emui | RomFamily::OneUi => 4000,
            RomFamily::MagicOs => 3500,
            RomFamily::Flyme | RomFamily::StockAndroid | RomFamily::Other => 5000,
        };
        Duration::from_millis(millis)
    }

    pub fn recommended_retry_count(&self) -> u32 {
        match self.rom {
            RomFamily::Miui | RomFamily::HyperOs | RomFamily::ColorOs | RomFamily::OriginOs => 2,
            _ => 1,
        }
    }
}

/// Supplies the profile of the device the service runs on.
pub trait DeviceProfileProvider: Send + Sync {
    fn current_device(&self) -> DeviceProfile;
}

/// Provider returning a fixed profile.
#[derive(Debug, Clone, Default)]
pub struct StaticDeviceProvider(pub DeviceProfile);

impl DeviceProfileProvider for StaticDeviceProvider {
    fn current_device(&self) -> DeviceProfile {
        self.0.clone()
    }
}

fn detect_rom(manufacturer: Manufacturer, build: &BuildInfo) -> RomFamily {
    match manufacturer {
        Manufacturer::Xiaomi => {
            if build.has_property("ro.miui.ui.version.name") {
                if build.api_level >= API_HYPER_OS {
                    RomFamily::HyperOs
                } else {
                    RomFamily::Miui
                }
            } else if build.has_property("ro.mi.os.version.name") {
                RomFamily::HyperOs
            } else {
                RomFamily::Miui
            }
        }
        Manufacturer::Oppo | Manufacturer::OnePlus => {
            if build.has_property("ro.build.version.opporom") {
                RomFamily::ColorOs
            } else if build.has_property("ro.oxygen.version") {
                RomFamily::OxygenOs
            } else {
                RomFamily::ColorOs
            }
        }
        Manufacturer::Realme => RomFamily::RealmeUi,
        Manufacturer::Vivo => {
            if build.has_property("ro.vivo.os.version") {
                RomFamily::OriginOs
            } else {
                RomFamily::FuntouchOs
            }
        }
        Manufacturer::Huawei => {
            if build.has_property("hw_sc.build.platform.version") {
                RomFamily::HarmonyOs
            } else if build.has_property("ro.build.version.emui") {
                RomFamily::Emui
            } else if build.api_level >= API_INLINE_SUGGESTIONS {
                RomFamily::HarmonyOs
            } else {
                RomFamily::Emui
            }
        }
        Manufacturer::Honor => RomFamily::MagicOs,
        Manufacturer::Samsung => RomFamily::OneUi,
        Manufacturer::Meizu => RomFamily::Flyme,
        Manufacturer::Google => RomFamily::StockAndroid,
        Manufacturer::Lenovo | Manufacturer::Zte | Manufacturer::Nubia | Manufacturer::Other => {
            RomFamily::Other
        }
    }
}

fn rom_version(rom: RomFamily, build: &BuildInfo) -> String {
    let prop = |name: &str| build.property(name).unwrap_or("Unknown").to_owned();
    match rom {
        RomFamily::Miui => prop("ro.miui.ui.version.name"),
        RomFamily::HyperOs => prop("ro.mi.os.version.name"),
        RomFamily::ColorOs => prop("ro.build.version.opporom"),
        RomFamily::OriginOs => prop("ro.vivo.os.version"),
        RomFamily::Emui => prop("ro.build.version.emui"),
        RomFamily::HarmonyOs => prop("hw_sc.build.platform.version"),
        RomFamily::OxygenOs => prop("ro.oxygen.version"),
        RomFamily::MagicOs => format!("MagicOS {}", build.release),
        RomFamily::RealmeUi | RomFamily::OneUi | RomFamily::Flyme => rom.to_string(),
        RomFamily::FuntouchOs | RomFamily::StockAndroid | RomFamily::Other => "Unknown".to_owned(),
    }
}

fn inline_support(rom: RomFamily, api_level: u32) -> bool {
    if api_level < API_INLINE_SUGGESTIONS {
        return false;
    }
    match rom {
        RomFamily::Miui | RomFamily::HyperOs | RomFamily::OriginOs => {
            api_level >= API_INLINE_ON_VENDOR_ROMS
        }
        RomFamily::HarmonyOs | RomFamily::Emui => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(manufacturer: &str, brand: &str, api_level: u32, props: &[&str]) -> BuildInfo {
        BuildInfo {
            manufacturer: manufacturer.into(),
            brand: brand.into(),
            api_level,
            release: "14".into(),
            properties: props
                .iter()
                .map(|p| (p.to_string(), "V1".to_string()))
                .collect(),
        }
    }

    #[test]
    fn manufacturer_from_brand_strings() {
        assert_eq!(Manufacturer::detect("Xiaomi", "Redmi"), Manufacturer::Xiaomi);
        assert_eq!(Manufacturer::detect("unknown", "POCO"), Manufacturer::Xiaomi);
        assert_eq!(Manufacturer::detect("OnePlus", "OnePlus"), Manufacturer::OnePlus);
        assert_eq!(Manufacturer::detect("vivo", "iQOO"), Manufacturer::Vivo);
        assert_eq!(Manufacturer::detect("HONOR", "HONOR"), Manufacturer::Honor);
        assert_eq!(Manufacturer::detect("motorola", "moto"), Manufacturer::Lenovo);
        assert_eq!(Manufacturer::detect("Fairphone", "Fairphone"), Manufacturer::Other);
    }

    #[test]
    fn rom_from_properties_and_api_level() {
        let miui =
            DeviceProfile::detect(&build("Xiaomi", "Xiaomi", 33, &["ro.miui.ui.version.name"]));
        assert_eq!(miui.rom, RomFamily::Miui);
        assert_eq!(miui.rom_version, "V1");

        let hyper =
            DeviceProfile::detect(&build("Xiaomi", "Xiaomi", 34, &["ro.miui.ui.version.name"]));
        assert_eq!(hyper.rom, RomFamily::HyperOs);

        let oxygen =
            DeviceProfile::detect(&build("OnePlus", "OnePlus", 33, &["ro.oxygen.version"]));
        assert_eq!(oxygen.rom, RomFamily::OxygenOs);

        let funtouch = DeviceProfile::detect(&build("vivo", "vivo", 30, &[]));
        assert_eq!(funtouch.rom, RomFamily::FuntouchOs);

        let harmony = DeviceProfile::detect(&build("HUAWEI", "HUAWEI", 31, &[]));
        assert_eq!(harmony.rom, RomFamily::HarmonyOs);
        assert_eq!(harmony.rom_version, "Unknown");
        assert!(!harmony.supports_inline_suggestions);

        let honor = DeviceProfile::detect(&build("HONOR", "HONOR", 33, &[]));
        assert_eq!(honor.rom_version, "MagicOS 14");
    }

    #[test]
    fn save_flags_and_delayed_prompt_by_rom() {
        for rom in [
            RomFamily::Miui,
            RomFamily::HyperOs,
            RomFamily::OriginOs,
            RomFamily::FuntouchOs,
        ] {
            let device = DeviceProfile::new(Manufacturer::Other, rom, 33);
            assert_eq!(device.recommended_save_flags(), 0, "{rom}");
            assert!(!device.supports_delayed_save_prompt(), "{rom}");
        }

        let samsung = DeviceProfile::new(Manufacturer::Samsung, RomFamily::OneUi, 26);
        assert_eq!(samsung.recommended_save_flags(), FLAG_SAVE_ON_ALL_VIEWS_INVISIBLE);
        assert!(samsung.supports_delayed_save_prompt());

        let old_other = DeviceProfile::new(Manufacturer::Other, RomFamily::Other, 27);
        assert!(!old_other.supports_delayed_save_prompt());
        let new_other = DeviceProfile::new(Manufacturer::Other, RomFamily::Other, 28);
        assert!(new_other.supports_delayed_save_prompt());
    }

    #[test]
    fn timeouts_and_retries_by_rom() {
        let cases = [
            (RomFamily::Miui, 3000, 2),
            (RomFamily::ColorOs, 4500, 2),
            (RomFamily::RealmeUi, 4500, 1),
            (RomFamily::FuntouchOs, 2500, 1),
            (RomFamily::OriginOs, 2500, 2),
            (RomFamily::Emui, 4000, 1),
            (RomFamily::MagicOs, 3500, 1),
            (RomFamily::StockAndroid, 5000, 1),
        ];
        for (rom, timeout_ms, retries) in cases {
            let device = DeviceProfile::new(Manufacturer::Other, rom, 33);
            assert_eq!(device.recommended_timeout(), Duration::from_millis(timeout_ms), "{rom}");
            assert_eq!(device.recommended_retry_count(), retries, "{rom}");
        }
    }

    #[test]
    fn inline_support_depends_on_api_level() {
        assert!(!DeviceProfile::stock(29).supports_inline_suggestions);
        assert!(DeviceProfile::stock(30).supports_inline_suggestions);
        let miui = |api| DeviceProfile::new(Manufacturer::Xiaomi, RomFamily::Miui, api);
        assert!(!miui(30).supports_inline_suggestions);
        assert!(miui(31).supports_inline_suggestions);
    }
}

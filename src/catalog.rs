//! Services, add-ons and vehicle types offered by the business, with prices in cents.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price_cents: u32,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price_cents: u32,
}

pub static SERVICES: [ServiceDefinition; 3] = [
    ServiceDefinition {
        id: "basic_shine",
        name: "Basic Shine Package",
        description: "Hand wash and foam bath, wheels and tires, interior vacuum and wipe down, windows inside and out, spray wax.",
        price_cents: 6000,
        duration_minutes: 60,
    },
    ServiceDefinition {
        id: "full_interior",
        name: "Full Interior Shine",
        description: "Full interior vacuum, steam cleaning of floors, mats and cloth seats, leather and plastic conditioning, vents and door panels.",
        price_cents: 9000,
        duration_minutes: 120,
    },
    ServiceDefinition {
        id: "earned_signature",
        name: "The Earned Shine Signature Package",
        description: "Full interior and exterior detail with ceramic sealant upgrade, engine bay wipe-down and high-gloss finish.",
        price_cents: 13000,
        duration_minutes: 180,
    },
];

pub static ADDONS: [AddonDefinition; 9] = [
    AddonDefinition {
        id: "clay_bar_treatment",
        name: "Clay Bar Treatment",
        description: "Removes bonded contaminants for a smooth finish",
        price_cents: 4000,
    },
    AddonDefinition {
        id: "headlight_restoration",
        name: "Headlight Restoration",
        description: "Clears foggy or yellowed headlights",
        price_cents: 3000,
    },
    AddonDefinition {
        id: "high_gloss_tire_dressing",
        name: "High-Gloss Tire Dressing",
        description: "Deep, clean showroom shine for tires",
        price_cents: 1000,
    },
    AddonDefinition {
        id: "windshield_rain_repellent",
        name: "Windshield Rain Repellent Coating",
        description: "Helps water bead off the windshield",
        price_cents: 1500,
    },
    AddonDefinition {
        id: "pet_hair_removal",
        name: "Pet Hair Removal",
        description: "Gets stubborn pet hair out of seats and carpet",
        price_cents: 2000,
    },
    AddonDefinition {
        id: "ozone_odor_treatment",
        name: "Ozone Odor Treatment",
        description: "Neutralizes smoke, food or pet odors",
        price_cents: 3000,
    },
    AddonDefinition {
        id: "stain_extraction",
        name: "Stain Extraction (Per Seat/Area)",
        description: "Spot treatment for spills and built-up stains",
        price_cents: 1000,
    },
    AddonDefinition {
        id: "engine_bay_deep_cleaning",
        name: "Engine Bay Deep Cleaning",
        description: "Degreased and detailed engine bay",
        price_cents: 3000,
    },
    AddonDefinition {
        id: "scratch_paint_touch_up",
        name: "Scratch & Paint Touch-Up",
        description: "Light scratches and paint blemishes touched up on-site",
        price_cents: 5000,
    },
];

const VEHICLE_TYPES: [(&str, &str); 4] = [
    ("sedan", "Sedan/Coupe"),
    ("suv", "SUV/Minivan"),
    ("truck", "Truck"),
    ("motorcycle", "Motorcycle"),
];

pub fn service(id: &str) -> Option<&'static ServiceDefinition> {
    SERVICES.iter().find(|service| service.id == id)
}

pub fn addon(id: &str) -> Option<&'static AddonDefinition> {
    ADDONS.iter().find(|addon| addon.id == id)
}

pub fn service_duration(id: &str) -> Option<u32> {
    service(id).map(|service| service.duration_minutes)
}

pub fn vehicle_label(id: &str) -> Option<&'static str> {
    VEHICLE_TYPES
        .iter()
        .find(|(vehicle, _)| *vehicle == id)
        .map(|(_, label)| *label)
}

/// Unknown service or add-on ids contribute nothing.
pub fn total_price_cents(service_type: &str, addons: &[String]) -> u32 {
    let base = service(service_type).map_or(0, |service| service.price_cents);
    addons
        .iter()
        .filter_map(|id| addon(id))
        .fold(base, |total, addon| total + addon.price_cents)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_case::test_case("basic_shine", &[], 6000)]
    #[test_case::test_case("full_interior", &["pet_hair_removal", "stain_extraction"], 12000)]
    #[test_case::test_case("earned_signature", &["scratch_paint_touch_up"], 18000)]
    #[test_case::test_case("mystery", &["clay_bar_treatment"], 4000)]
    fn test_total_price(service_type: &str, addons: &[&str], expected: u32) {
        let addons: Vec<String> = addons.iter().map(|a| a.to_string()).collect();
        assert_eq!(total_price_cents(service_type, &addons), expected);
    }

    #[test]
    fn durations_are_whole_slots() {
        for service in &SERVICES {
            assert_eq!(service.duration_minutes % 60, 0, "{}", service.id);
        }
        assert_eq!(service("earned_signature").unwrap().duration_minutes, 180);
    }

    #[test]
    fn vehicle_labels() {
        assert_eq!(vehicle_label("suv"), Some("SUV/Minivan"));
        assert_eq!(vehicle_label("boat"), None);
    }
}

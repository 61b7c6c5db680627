use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Tier1,
    Tier2,
    Tier3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub port: u16,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }
}

/// Static per-tier configuration: which image a target is cloned from, which
/// services it must expose, and how it is prepared after cloning. Fixed for
/// the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSpec {
    pub base_image: String,
    pub services: Vec<ServiceSpec>,
    pub setup_commands: Vec<String>,
    pub address_offset: u8,
}

impl Tier {
    pub fn as_str(&self) -> &str {
        match self {
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
            Tier::Tier3 => "tier3",
        }
    }

    pub fn parse(s: &str) -> Option<Tier> {
        match s {
            "tier1" => Some(Tier::Tier1),
            "tier2" => Some(Tier::Tier2),
            "tier3" => Some(Tier::Tier3),
            _ => None,
        }
    }

    pub fn all() -> [Tier; 3] {
        [Tier::Tier1, Tier::Tier2, Tier::Tier3]
    }

    pub fn spec(&self) -> TierSpec {
        match self {
            Tier::Tier1 => TierSpec {
                base_image: "range-tier1-base".to_string(),
                services: vec![ServiceSpec::new("http", 80), ServiceSpec::new("ssh", 22)],
                setup_commands: vec![
                    "systemctl enable --now apache2".to_string(),
                    "useradd -m -s /bin/bash operator".to_string(),
                    "cp -r /opt/range/tier1/www/* /var/www/html/".to_string(),
                ],
                address_offset: 10,
            },
            Tier::Tier2 => TierSpec {
                base_image: "range-tier2-base".to_string(),
                services: vec![
                    ServiceSpec::new("http", 80),
                    ServiceSpec::new("ssh", 22),
                    ServiceSpec::new("mysql", 3306),
                ],
                setup_commands: vec![
                    "systemctl enable --now apache2 mysql".to_string(),
                    "mysql < /opt/range/tier2/seed.sql".to_string(),
                    "useradd -m -s /bin/bash operator".to_string(),
                ],
                address_offset: 20,
            },
            Tier::Tier3 => TierSpec {
                base_image: "range-tier3-base".to_string(),
                services: vec![
                    ServiceSpec::new("smb", 445),
                    ServiceSpec::new("rdp", 3389),
                    ServiceSpec::new("ssh", 22),
                ],
                setup_commands: vec![
                    "systemctl enable --now smbd xrdp".to_string(),
                    "sh /opt/range/tier3/seed-shares.sh".to_string(),
                ],
                address_offset: 30,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips() {
        for tier in Tier::all() {
            assert_eq!(Tier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(Tier::parse("tier9"), None);
    }

    #[test]
    fn test_specs_have_distinct_address_offsets() {
        let offsets: Vec<u8> = Tier::all().iter().map(|t| t.spec().address_offset).collect();
        assert_eq!(offsets, vec![10, 20, 30]);
    }

    #[test]
    fn test_every_tier_exposes_services() {
        for tier in Tier::all() {
            let spec = tier.spec();
            assert!(!spec.services.is_empty());
            assert!(!spec.setup_commands.is_empty());
            assert!(!spec.base_image.is_empty());
        }
    }
}

//! Anomalies that are kept in the output but deserve a comment.

use super::Transformer;
use crate::types::{DstRef, Policies, Zones, hms_string};

const ONE_HOUR: i32 = 3600;
const HALF_HOUR: i32 = 1800;

impl Transformer {
    pub(super) fn note_anomalies(&mut self, zones: &Zones, policies: &Policies) {
        for (name, rules) in policies {
            for rule in rules.iter().filter(|r| !r.anchor) {
                let save = rule.save_seconds;
                if save < 0 {
                    self.note_policy(name, Some(format!("negative SAVE {}", hms_string(save))));
                } else if save != 0 && save != ONE_HOUR {
                    self.note_policy(name, Some(format!("SAVE {} is not 1:00", hms_string(save))));
                }
            }
        }

        for (name, eras) in zones {
            for era in eras {
                if era.std_offset_seconds % HALF_HOUR != 0 {
                    let note = format!("STDOFF {} is not a multiple of 0:30", hms_string(era.std_offset_seconds));
                    self.note_zone(name, Some(note));
                }
                if let DstRef::Fixed(amount) = era.dst {
                    if amount != 0 && amount != ONE_HOUR {
                        self.note_zone(name, Some(format!("fixed RULES {} is not 1:00", hms_string(amount))));
                    }
                }
            }
        }
    }
}

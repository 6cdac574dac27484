use crate::error::{Error, ErrorKind};
use derive_more::Display;
use std::str::FromStr;

/// Reading status of a tracked title.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    #[display("reading")]
    Reading,
    #[display("completed")]
    Completed,
    #[display("on_hold")]
    OnHold,
    #[display("dropped")]
    Dropped,
    #[display("plan_to_read")]
    PlanToRead,
}
impl Status {
    pub const ALL: [Status; 5] = [Self::Reading, Self::Completed, Self::OnHold, Self::Dropped, Self::PlanToRead];
}
impl FromStr for Status {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Ok(match normalized.as_str() {
            "reading" => Self::Reading,
            "completed" => Self::Completed,
            "on_hold" => Self::OnHold,
            "dropped" => Self::Dropped,
            "plan_to_read" => Self::PlanToRead,
            _ => exn::bail!(ErrorKind::InvalidData("status")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("reading", Status::Reading)]
    #[case("Completed", Status::Completed)]
    #[case("on-hold", Status::OnHold)]
    #[case("on hold", Status::OnHold)]
    #[case(" dropped ", Status::Dropped)]
    #[case("PLAN_TO_READ", Status::PlanToRead)]
    fn test_parse(#[case] input: &str, #[case] expected: Status) {
        assert_eq!(input.parse::<Status>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown() {
        assert!("binging".parse::<Status>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for status in Status::ALL {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
    }
}

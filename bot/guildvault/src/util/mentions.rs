use crate::models::id::{marker::UserMarker, Id};
use regex::Regex;
use std::str::FromStr;

lazy_static! {
    static ref FULL_USER_MENTION_REGEX: Regex = Regex::new(r"^<@!?(\d+)>$").unwrap();
}

/// A command argument naming a user, either as a mention or a raw id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserArgument(pub Id<UserMarker>);

impl FromStr for UserArgument {
    type Err = String;

    fn from_str(arg: &str) -> Result<Self, Self::Err> {
        let digits = FULL_USER_MENTION_REGEX
            .captures(arg)
            .and_then(|captures| captures.get(1))
            .map(|hit| hit.as_str())
            .unwrap_or(arg);
        u64::from_str(digits)
            .ok()
            .and_then(Id::new_checked)
            .map(Self)
            .ok_or_else(|| format!("`{}` is not a user mention", arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_argument_accepts_mentions_and_ids() {
        assert_eq!("<@!42>".parse::<UserArgument>(), Ok(UserArgument(Id::new(42))));
        assert_eq!("42".parse::<UserArgument>(), Ok(UserArgument(Id::new(42))));
        assert!("<@&42>".parse::<UserArgument>().is_err());
        assert!("0".parse::<UserArgument>().is_err());
    }
}

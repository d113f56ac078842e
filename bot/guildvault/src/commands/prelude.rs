use super::Arguments;
use std::str::FromStr;

pub trait ArgumentsExt {
    fn parse_next<T: FromArgument>(&mut self) -> Result<Option<T>, <T as FromArgument>::Err>;

    /// Joins every remaining argument with single spaces.
    fn remainder(&mut self) -> String;
}

pub trait FromArgument: Sized {
    type Err;
    fn parse_as(arg: impl AsRef<str>) -> Result<Self, Self::Err>;
}

impl ArgumentsExt for Arguments<'_> {
    fn parse_next<T: FromArgument>(&mut self) -> Result<Option<T>, <T as FromArgument>::Err> {
        if let Some(arg) = self.peek() {
            let result = T::parse_as(*arg)?;
            self.next();
            Ok(Some(result))
        } else {
            Ok(None)
        }
    }

    fn remainder(&mut self) -> String {
        self.collect::<Vec<_>>().join(" ")
    }
}

impl<T: FromStr> FromArgument for T {
    type Err = <T as FromStr>::Err;
    fn parse_as(arg: impl AsRef<str>) -> Result<Self, Self::Err> {
        arg.as_ref().parse()
    }
}

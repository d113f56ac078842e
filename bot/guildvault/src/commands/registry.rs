use super::{CommandError, Invocation};
use std::fmt::Write;

/// How many whitespace-separated arguments a command accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const NONE: Self = Self::exactly(0);

    pub const fn exactly(count: usize) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map(|max| count <= max).unwrap_or(true)
    }
}

#[derive(Clone, Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Arguments as shown in help, e.g. `[@user]`.
    pub usage: &'static str,
    pub description: &'static str,
    pub arity: Arity,
}

impl CommandSpec {
    pub fn usage_line(&self, prefix: &str) -> String {
        if self.usage.is_empty() {
            format!("{}{}", prefix, self.name)
        } else {
            format!("{}{} {}", prefix, self.name, self.usage)
        }
    }
}

/// The commands a client answers to, each mapped to a handler.
pub struct CommandTable<H> {
    commands: Vec<(CommandSpec, H)>,
}

impl<H> Default for CommandTable<H> {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

impl<H> CommandTable<H> {
    pub fn register(mut self, spec: CommandSpec, handler: H) -> Self {
        debug_assert!(
            self.lookup(spec.name).is_none(),
            "command registered twice: {}",
            spec.name
        );
        self.commands.push((spec, handler));
        self
    }

    pub fn lookup(&self, name: &str) -> Option<(&CommandSpec, &H)> {
        self.commands
            .iter()
            .find(|(spec, _)| spec.name.eq_ignore_ascii_case(name))
            .map(|(spec, handler)| (spec, handler))
    }

    /// Finds the handler for an invocation and checks its argument count.
    pub fn resolve(
        &self,
        prefix: &str,
        invocation: &Invocation<'_>,
    ) -> Result<(&CommandSpec, &H), CommandError> {
        let (spec, handler) = self
            .lookup(&invocation.name)
            .ok_or_else(|| CommandError::UnknownCommand(invocation.name.clone()))?;
        if !spec.arity.accepts(invocation.argument_count()) {
            return Err(CommandError::Usage(spec.usage_line(prefix)));
        }
        Ok((spec, handler))
    }

    pub fn specs(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter().map(|(spec, _)| spec)
    }

    pub fn help(&self, prefix: &str) -> String {
        let mut help = String::from("**Available commands:**\n");
        for spec in self.specs() {
            let _ = write!(help, "\n`{}` - {}", spec.usage_line(prefix), spec.description);
        }
        help
    }
}

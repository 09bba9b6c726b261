#![forbid(unsafe_code)]

//! Deferred commands returned from controller updates.
//!
//! A command is work the host performs *after* applying the state change
//! that produced it. Feeding `Cmd::Msg` back into the controller on the
//! next turn yields exactly one suspension point between a rebuild and its
//! follow-up, which is what the refocus ordering relies on.

/// A deferred follow-up for the host to run after the current update has
/// been committed.
#[derive(Debug, Clone, PartialEq)]
pub enum Cmd<M> {
    /// Nothing to do.
    None,
    /// Feed this message back into the controller on the next turn.
    Msg(M),
    /// Run several commands in order.
    Batch(Vec<Cmd<M>>),
}

impl<M> Cmd<M> {
    #[must_use]
    pub const fn none() -> Self {
        Self::None
    }

    #[must_use]
    pub const fn msg(message: M) -> Self {
        Self::Msg(message)
    }

    #[must_use]
    pub fn batch(commands: impl IntoIterator<Item = Cmd<M>>) -> Self {
        let mut commands: Vec<Cmd<M>> = commands
            .into_iter()
            .filter(|cmd| !cmd.is_none())
            .collect();
        match commands.len() {
            0 => Self::None,
            1 => commands.remove(0),
            _ => Self::Batch(commands),
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Flatten into the messages the host should feed back, in order.
    #[must_use]
    pub fn into_messages(self) -> Vec<M> {
        match self {
            Self::None => vec![],
            Self::Msg(message) => vec![message],
            Self::Batch(commands) => commands
                .into_iter()
                .flat_map(Cmd::into_messages)
                .collect(),
        }
    }
}

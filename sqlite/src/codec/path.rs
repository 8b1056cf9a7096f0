//! Coding paths for codec diagnostics.

use std::fmt;

/// One frame of the value tree being encoded or decoded.
///
/// Frames link to their parent, so a nested failure can report where it
/// happened without the codec maintaining a separate stack.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Frame<'p> {
    Root,
    Field { parent: &'p Frame<'p>, name: &'p str },
    Index { parent: &'p Frame<'p>, index: usize },
}

pub(crate) const ROOT: Frame<'static> = Frame::Root;

impl<'p> Frame<'p> {
    pub(crate) fn field(parent: &'p Frame<'p>, name: &'p str) -> Self {
        Frame::Field { parent, name }
    }

    pub(crate) fn index(parent: &'p Frame<'p>, index: usize) -> Self {
        Frame::Index { parent, index }
    }

    /// Name of the innermost field, if any.
    pub(crate) fn name(&self) -> Option<&'p str> {
        match self {
            Frame::Field { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Renders the path as `[3].value`; the root renders as `$`.
    pub(crate) fn render(&self) -> String {
        self.to_string()
    }

    fn write_path(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Root => Ok(()),
            Frame::Field { parent, name } => {
                parent.write_path(f)?;
                if matches!(parent, Frame::Root) {
                    f.write_str(name)
                } else {
                    write!(f, ".{name}")
                }
            }
            Frame::Index { parent, index } => {
                parent.write_path(f)?;
                write!(f, "[{index}]")
            }
        }
    }
}

impl fmt::Display for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if matches!(self, Frame::Root) {
            return f.write_str("$");
        }
        self.write_path(f)
    }
}

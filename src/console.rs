//! Console UI command decoding (§4.14, ambient supplement).
//!
//! Named in the distilled spec's External Interfaces section but not broken
//! out as its own [MODULE]; implemented here as a thin, allocation-free
//! decoder from a single ASCII byte to a [`UiCommand`]. The UART transport
//! and the 24-line ANSI display layout both stay out of scope -- the
//! embedder feeds bytes in and renders views from the settings/folder-tree
//! state itself; this module only turns a byte into an intent.

use crate::error::Error;
use crate::settings::folder::FolderTree;

/// A decoded console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UiCommand {
    /// `'1'`/`'2'`/`'3'`: enter subfolder 0/1/2, or apply action choice 0/1/2
    /// if the current folder is an action folder. Already 0-indexed, the
    /// same convention [`FolderTree::enter`]'s `choice` parameter uses, so
    /// [`apply`] passes it straight through.
    Subfolder(u8),
    /// `'r'`: return to root.
    Root,
    /// `'u'`: go up one level.
    Up,
    /// `'p'`: reprint the settings table and folder view.
    Print,
}

/// Decodes a single console byte. Any byte other than `'1'`, `'2'`, `'3'`,
/// `'r'`, `'u'`, `'p'` is `Err(Error::InvalidCommand)`.
pub fn decode<StoreE>(byte: u8) -> Result<UiCommand, Error<StoreE>> {
    match byte {
        b'1' => Ok(UiCommand::Subfolder(0)),
        b'2' => Ok(UiCommand::Subfolder(1)),
        b'3' => Ok(UiCommand::Subfolder(2)),
        b'r' => Ok(UiCommand::Root),
        b'u' => Ok(UiCommand::Up),
        b'p' => Ok(UiCommand::Print),
        _ => Err(Error::InvalidCommand),
    }
}

/// Applies a decoded command to a folder tree: `Subfolder(n)` enters child
/// `n` of the current folder (or invokes an action folder's callback with
/// choice `n`); `Root`/`Up` navigate; `Print` is a no-op here, since
/// rendering the current folder and the settings table is the embedder's
/// job.
pub fn apply<Env>(cmd: UiCommand, tree: &mut FolderTree<Env>, env: &mut Env) {
    match cmd {
        UiCommand::Subfolder(choice) => tree.enter(env, choice),
        UiCommand::Root => tree.go_to_root(),
        UiCommand::Up => tree.go_up(),
        UiCommand::Print => {}
    }
}

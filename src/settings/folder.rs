//! Folder-tree settings/profile UI (§4.12).
//!
//! Grounded on `machine_logic/local_ui.h`/`.c`. Folders form a tree
//! navigated by single-digit choices; a folder either has subfolders or is
//! an "action folder" that invokes a callback instead of descending. The
//! source's linked list of heap-allocated nodes is replaced by an
//! index-addressed arena (`heapless::Vec<Folder, N>`) since the crate is
//! `no_std` and the tree is built once at startup and never resized after.
//!
//! `folder_id` packs one 4-bit nibble per tree level (max depth 8,
//! `FolderId::level`/`FolderId::child_id`/`FolderId::contains` reproduce the
//! source's bit-splitting arithmetic 1:1, since Testable Property 11 pins it
//! exactly).

use heapless::Vec;

pub const MAX_FOLDERS: usize = 32;
pub const MAX_CHILDREN: usize = 8;
pub const MAX_DEPTH: u8 = 8;

/// A folder's structured id: one 4-bit nibble per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FolderId(pub u32);

impl FolderId {
    pub const ROOT: FolderId = FolderId(0);

    fn nibble(self, level: u8) -> u8 {
        if level >= MAX_DEPTH {
            0
        } else {
            ((self.0 >> (4 * level as u32)) & 0xF) as u8
        }
    }

    /// The depth of this id: the first level whose nibble is all-zero.
    pub fn level(self) -> u8 {
        let mut level = 0;
        while self.nibble(level) != 0 {
            level += 1;
        }
        level
    }

    /// The id of child `child_index` (0-based) of a folder at `self` with
    /// `parent_level`.
    fn child_id(self, parent_level: u8, child_index: u8) -> FolderId {
        FolderId(self.0 | ((child_index as u32) << (4 * parent_level as u32)))
    }

    /// True iff `self`'s subtree would contain `id`.
    pub fn contains(self, id: FolderId) -> bool {
        let level = self.level();
        let mask: u32 = if level >= 8 { u32::MAX } else { !(u32::MAX << (4 * level as u32)) };
        self.0 == (id.0 & mask)
    }
}

/// Invoked when an action folder's choice is entered. `folder_id` identifies
/// the action folder, `choice` is the digit chosen, `data` is the opaque
/// parameter set when the folder was created (e.g. a profile slot number).
/// Returning `true` means the tree should return to root after the call.
pub type FolderAction<Env> = fn(env: &mut Env, folder_id: FolderId, choice: u8, data: i32) -> bool;

struct Folder<Env> {
    id: FolderId,
    parent: Option<usize>,
    name: &'static str,
    action: Option<FolderAction<Env>>,
    data: i32,
    children: Vec<usize, MAX_CHILDREN>,
}

/// A folder tree plus the index of the currently active folder.
pub struct FolderTree<Env> {
    folders: Vec<Folder<Env>, MAX_FOLDERS>,
    current: usize,
}

impl<Env> FolderTree<Env> {
    /// Creates a tree with just a root folder named `root_name`.
    pub fn new(root_name: &'static str) -> Self {
        let mut folders = Vec::new();
        let _ = folders.push(Folder {
            id: FolderId::ROOT,
            parent: None,
            name: root_name,
            action: None,
            data: 0,
            children: Vec::new(),
        });
        Self { folders, current: 0 }
    }

    /// Adds a navigable subfolder (no action) under `parent`. Returns the
    /// new folder's index, or `Err(())` if either capacity is exceeded.
    pub fn add_subfolder(&mut self, parent: usize, name: &'static str) -> Result<usize, ()> {
        self.add_folder(parent, name, None, 0)
    }

    /// Adds an action folder under `parent`. `data` is the opaque parameter
    /// passed to `action` on every invocation (e.g. a profile slot number).
    pub fn add_action_folder(
        &mut self,
        parent: usize,
        name: &'static str,
        action: FolderAction<Env>,
        data: i32,
    ) -> Result<usize, ()> {
        self.add_folder(parent, name, Some(action), data)
    }

    fn add_folder(
        &mut self,
        parent: usize,
        name: &'static str,
        action: Option<FolderAction<Env>>,
        data: i32,
    ) -> Result<usize, ()> {
        let parent_level = self.folders[parent].id.level();
        let child_index = self.folders[parent].children.len() as u8;
        let id = self.folders[parent].id.child_id(parent_level, child_index);
        let folder = Folder { id, parent: Some(parent), name, action, data, children: Vec::new() };
        self.folders.push(folder).map_err(|_| ())?;
        let new_idx = self.folders.len() - 1;
        self.folders[parent].children.push(new_idx).map_err(|_| ())?;
        Ok(new_idx)
    }

    /// The currently active folder's index.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_id(&self) -> FolderId {
        self.folders[self.current].id
    }

    pub fn current_name(&self) -> &'static str {
        self.folders[self.current].name
    }

    /// The names of the current folder's children, in order.
    pub fn current_children(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.folders[self.current]
            .children
            .iter()
            .map(move |&i| self.folders[i].name)
    }

    pub fn is_action_folder(&self, idx: usize) -> bool {
        self.folders[idx].action.is_some()
    }

    /// Jumps back to the root.
    pub fn go_to_root(&mut self) {
        self.current = 0;
    }

    /// Moves to the current folder's parent, if any.
    pub fn go_up(&mut self) {
        if let Some(parent) = self.folders[self.current].parent {
            self.current = parent;
        }
    }

    /// Enters subfolder `choice` of the current folder, or -- if the current
    /// folder is an action folder -- invokes its action with `choice`.
    /// Out-of-range choices on a non-action folder are a no-op.
    pub fn enter(&mut self, env: &mut Env, choice: u8) {
        let folder = &self.folders[self.current];
        if let Some(action) = folder.action {
            let (id, data) = (folder.id, folder.data);
            if action(env, id, choice, data) {
                self.go_to_root();
            }
        } else if let Some(&child) = folder.children.get(choice as usize) {
            self.current = child;
        }
    }
}

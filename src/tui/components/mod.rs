//! # TUI Components
//!
//! This module contains all UI components for the terminal interface.
//!
//! ## Component Architecture
//!
//! Components in this directory follow two patterns:
//!
//! ### Stateless Components (Props-Based Rendering)
//!
//! Simple display components that receive all data as parameters:
//! - `TitleBar`: Top status bar showing model name and status
//! - `Message`: One conversation card
//! - `LandingPage`: Greeting and starter prompts for an empty conversation
//! - `Toast`: Transient notice in the top-right corner
//!
//! ### Stateful Components (Event-Driven)
//!
//! Components that manage local state and emit events:
//! - `InputBox`: Draft editor with the attachment tray
//! - `MessageList`: Scrollable conversation view with layout caching
//! - `FilePreview`: Overlay previewing one message's attachments
//!
//! ## Props-Based Data Flow
//!
//! Components receive external data as "props" (function parameters), not by
//! directly accessing `App`. The message list reads a `ConversationView`
//! built by `core::view`, never the message log's parts directly, except
//! to fetch attachment bytes for thumbnails.
//!
//! ## Module Structure
//!
//! ```text
//! components/
//! ├── mod.rs           (this file)
//! ├── title_bar.rs     (Top status bar)
//! ├── message.rs       (Single message card)
//! ├── message_list.rs  (Scrollable message container)
//! ├── landing.rs       (Empty-conversation screen)
//! ├── file_preview.rs  (Attachment preview overlay)
//! ├── toast.rs         (Transient notices)
//! └── input_box/       (Draft editor and attachment tray)
//! ```

mod title_bar;
pub use title_bar::TitleBar;

pub mod file_preview;
pub mod input_box;
pub mod landing;
pub mod message;
pub mod message_list;
pub mod toast;

pub use file_preview::{FilePreview, FilePreviewState, PreviewEvent};
pub use input_box::{InputBox, InputEvent};
pub use landing::LandingPage;
pub use message_list::{MessageList, MessageListState};
pub use toast::Toast;

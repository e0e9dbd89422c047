// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Stream decoder for inbound command arrays.
pub mod codec;
/// Typed reply frames and their byte encoding.
pub mod frame;

pub use codec::FrameReader;
pub use frame::Frame;

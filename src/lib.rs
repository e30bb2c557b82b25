// SPDX-License-Identifier: Apache-2.0

pub mod bounded_channel;
pub mod checkpoint;
pub mod error;
pub mod init;
pub mod pipeline;
pub mod sink;
pub mod source;

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

mod client;

pub use client::AzureClient;

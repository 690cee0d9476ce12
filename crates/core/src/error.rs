// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use jiff::SignedDuration;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum GateError {
    #[snafu(display("Resource {id} does not exist"))]
    ResourceNotFound { id: usize },

    #[snafu(display("File {} is missing on disk", path.display()))]
    FileMissing { path: PathBuf },

    #[snafu(display("Download limit reached, retry in {}s", retry_after.as_secs()))]
    QuotaExceeded { retry_after: SignedDuration },

    #[snafu(display("File read error: {source}"))]
    FileRead { source: std::io::Error },

    #[snafu(display("Ledger write error at {}: {source}", path.display()))]
    LedgerWrite {
        path:   PathBuf,
        source: std::io::Error,
    },
}

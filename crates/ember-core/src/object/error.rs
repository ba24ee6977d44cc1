// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::object::CoreObjectId;
use crate::thread::CoreThreadError;
use thiserror::Error;

/// Errors raised by the core object lifecycle.
#[derive(Debug, Error)]
pub enum CoreObjectError {
    /// `initialize` was called on an object already initialized or scheduled for it.
    #[error("{type_name} {id} is already initialized or scheduled for initialization")]
    AlreadyInitialized {
        /// Concrete type of the object.
        type_name: &'static str,
        /// Id of the object.
        id: CoreObjectId,
    },

    /// `destroy` was called on an object that was never initialized.
    #[error("{type_name} {id} cannot be destroyed before it is initialized")]
    NotInitialized {
        /// Concrete type of the object.
        type_name: &'static str,
        /// Id of the object.
        id: CoreObjectId,
    },

    /// The object was already destroyed or scheduled for destruction.
    #[error("{type_name} {id} is destroyed or scheduled for destruction")]
    Destroyed {
        /// Concrete type of the object.
        type_name: &'static str,
        /// Id of the object.
        id: CoreObjectId,
    },

    /// A wait was requested on an object nothing will ever initialize.
    #[error("{type_name} {id} was never scheduled for initialization")]
    NotScheduled {
        /// Concrete type of the object.
        type_name: &'static str,
        /// Id of the object.
        id: CoreObjectId,
    },

    /// The object's initialization ran and failed.
    #[error("{type_name} {id} failed to initialize: {reason}")]
    InitializationFailed {
        /// Concrete type of the object.
        type_name: &'static str,
        /// Id of the object.
        id: CoreObjectId,
        /// Why initialization failed.
        reason: String,
    },

    /// The core thread tried to wait for an initialization only it can run.
    #[error("waiting on {type_name} {id} from the core thread would deadlock")]
    WaitOnCoreThread {
        /// Concrete type of the object.
        type_name: &'static str,
        /// Id of the object.
        id: CoreObjectId,
    },

    /// Core objects were still alive when the registry had to be empty.
    #[error("{count} core objects were leaked")]
    LeakedObjects {
        /// Number of objects still registered.
        count: usize,
    },

    /// The core thread rejected the command.
    #[error(transparent)]
    CoreThread(#[from] CoreThreadError),
}

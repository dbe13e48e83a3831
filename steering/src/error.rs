/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! Library errors.

use std::error::Error;
use std::fmt;

/// Cause of error.
#[derive(Debug, PartialEq, Eq)]
pub enum SteeringErrorKind {
    /// General failure. See message for details.
    Unspecified,
    /// Connectivity related problem. See message for details.
    Connection,
    /// The object could not be found.
    NotFound,
    /// The object is not in the expected format.
    Malformed,
    /// The service cannot serve this request yet.
    NotReady,
}

impl SteeringErrorKind {
    /// Create a new instance with an error message.
    pub fn error_with_msg<S: AsRef<str>>(self, msg: S) -> SteeringError {
        SteeringError {
            kind: self,
            msg: Some(msg.as_ref().to_string()),
        }
    }

    /// Create a new instance without an error message.
    pub fn error(self) -> SteeringError {
        SteeringError {
            kind: self,
            msg: None,
        }
    }
}

impl fmt::Display for SteeringErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/** Library error.

Create a new instance via [SteeringErrorKind].
*/
#[derive(Debug)]
pub struct SteeringError {
    kind: SteeringErrorKind,
    msg: Option<String>,
}

impl SteeringError {
    /// Return the type of error.
    pub fn kind(&self) -> &SteeringErrorKind {
        &self.kind
    }
}

impl fmt::Display for SteeringError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(msg) = &self.msg {
            write!(f, "{} {}", self.kind, msg)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl AsRef<SteeringError> for SteeringError {
    fn as_ref(&self) -> &SteeringError {
        self
    }
}

impl Error for SteeringError {}

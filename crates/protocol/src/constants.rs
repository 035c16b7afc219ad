//! Endpoint paths and multipart field names.

/// Stores an image for the authenticated user.
pub const UPLOAD_IMAGE_PATH: &str = "/user/upload-image";

/// Fetches a stored image by id (`/user/get-image/{id}`).
pub const GET_IMAGE_PATH: &str = "/user/get-image";

/// Creates a user account.
pub const REGISTER_PATH: &str = "/user/register";

/// Exchanges credentials for a bearer token.
pub const LOGIN_PATH: &str = "/user/login";

/// Submits an image as a pending chain transaction.
pub const PROCESS_IMAGE_PATH: &str = "/blockchain/image/process";

/// Mines pending transactions into a new block.
pub const MINE_PATH: &str = "/blockchain/mine";

/// Returns the node's full chain.
pub const CHAIN_PATH: &str = "/blockchain/chain";

/// Triggers a simulated failure on the addressed node.
pub const SIMULATE_FAILURE_PATH: &str = "/blockchain/simulate/failure";

/// Multipart field carrying the image file on both upload endpoints.
pub const IMAGE_FIELD: &str = "image";

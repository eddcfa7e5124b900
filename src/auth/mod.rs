//! Session credentials: password hashing, JWT issue/verify, the `jwt` cookie
//! and the extractors that gate protected routes.
//!
//! Sessions are stateless. Logout only clears the client's cookie; a copied
//! token stays valid until its `exp`. Stronger revocation would need a
//! server-side denylist or short-lived tokens with refresh.

pub mod claims;
pub mod cookie;
pub mod extractors;
pub mod jwt;
pub mod password;

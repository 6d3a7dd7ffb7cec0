use crate::error::Result;
use crate::store::Store;

/// Returns true if the identity may read the photo: the owner always
/// can, anyone else needs a share grant. A missing photo is plain false,
/// indistinguishable from a denied one.
///
/// Pure read with no caching: grants can change between requests, so
/// every call re-reads current state.
pub fn can_read(store: &dyn Store, identity_id: &str, photo_id: &str) -> Result<bool> {
    let Some(photo) = store.get_photo(photo_id)? else {
        return Ok(false);
    };

    if photo.owner_id == identity_id {
        return Ok(true);
    }

    Ok(store.get_share_grant(photo_id, identity_id)?.is_some())
}

/// Sharing rights are owner-exclusive and non-transferable: a grantee
/// can read but never re-share.
pub fn can_share(store: &dyn Store, identity_id: &str, photo_id: &str) -> Result<bool> {
    let Some(photo) = store.get_photo(photo_id)? else {
        return Ok(false);
    };

    Ok(photo.owner_id == identity_id)
}

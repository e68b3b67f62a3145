use deadpool_diesel::sqlite::Connection;
use diesel::prelude::*;

use super::util::err_is_not_found;
use crate::{
    models::{File, Photo},
    schema::{
        files::{self, dsl as files_dsl},
        photos::{self, dsl as photos_dsl},
    },
    types::AppError,
};

pub async fn new_photo(conn: Connection, photo: Photo) -> Result<Photo, AppError> {
    conn.interact(|conn| {
        let inserted = diesel::insert_into(photos::table).values(&photo).execute(conn);
        inserted.map(|_| photo)
    })
    .await
    .map_err(|e| {
        tracing::error!("error creating photo: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error creating photo: {:?}", e);
        AppError::DBErrorWithMessage(e.to_string())
    })
}

pub async fn new_file(conn: Connection, file: File) -> Result<File, AppError> {
    conn.interact(|conn| {
        let inserted = diesel::insert_into(files::table).values(&file).execute(conn);
        inserted.map(|_| file)
    })
    .await
    .map_err(|e| {
        tracing::error!("error creating file: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error creating file: {:?}", e);
        AppError::DBErrorWithMessage(e.to_string())
    })
}

pub async fn get_photo(conn: Connection, photo_id: String) -> Result<Photo, AppError> {
    conn.interact(|conn| {
        photos_dsl::photos
            .filter(photos_dsl::id.eq(photo_id))
            .select(Photo::as_select())
            .first(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error retrieving photo: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        if err_is_not_found(&e) {
            AppError::NotFound
        } else {
            tracing::error!("error retrieving photo: {:?}", e);
            AppError::DBError
        }
    })
}

pub async fn get_file(conn: Connection, file_id: String) -> Result<File, AppError> {
    conn.interact(|conn| {
        files_dsl::files
            .filter(files_dsl::id.eq(file_id))
            .select(File::as_select())
            .first(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error retrieving file: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        if err_is_not_found(&e) {
            AppError::NotFound
        } else {
            tracing::error!("error retrieving file: {:?}", e);
            AppError::DBError
        }
    })
}

/// Photos owned by `email`, newest first. With `public_only` private photos are left out.
pub async fn photos_for_user(
    conn: Connection,
    email: String,
    public_only: bool,
) -> Result<Vec<Photo>, AppError> {
    conn.interact(move |conn| {
        let mut query = photos_dsl::photos
            .filter(photos_dsl::user_email.eq(email))
            .order(photos_dsl::created_at.desc())
            .select(Photo::as_select())
            .into_boxed();
        if public_only {
            query = query.filter(photos_dsl::public.eq(true));
        }
        query.load(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error retrieving photos: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error retrieving photos: {:?}", e);
        AppError::DBError
    })
}

pub async fn files_for_user(
    conn: Connection,
    email: String,
    public_only: bool,
) -> Result<Vec<File>, AppError> {
    conn.interact(move |conn| {
        let mut query = files_dsl::files
            .filter(files_dsl::user_email.eq(email))
            .order(files_dsl::created_at.desc())
            .select(File::as_select())
            .into_boxed();
        if public_only {
            query = query.filter(files_dsl::public.eq(true));
        }
        query.load(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error retrieving files: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error retrieving files: {:?}", e);
        AppError::DBError
    })
}

pub async fn set_photo_rotation(
    conn: Connection,
    photo_id: String,
    rotation: i32,
) -> Result<(), AppError> {
    conn.interact(|conn| {
        diesel::update(photos_dsl::photos.filter(photos_dsl::id.eq(photo_id)))
            .set(photos_dsl::rotation.eq(rotation))
            .execute(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error rotating photo: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error rotating photo: {:?}", e);
        AppError::DBError
    })
    .and_then(|updated| if updated == 0 { Err(AppError::NotFound) } else { Ok(()) })
}

pub async fn set_photo_public(
    conn: Connection,
    photo_id: String,
    public: bool,
) -> Result<(), AppError> {
    conn.interact(|conn| {
        diesel::update(photos_dsl::photos.filter(photos_dsl::id.eq(photo_id)))
            .set(photos_dsl::public.eq(public))
            .execute(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error sharing photo: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error sharing photo: {:?}", e);
        AppError::DBError
    })
    .and_then(|updated| if updated == 0 { Err(AppError::NotFound) } else { Ok(()) })
}

pub async fn set_file_public(
    conn: Connection,
    file_id: String,
    public: bool,
) -> Result<(), AppError> {
    conn.interact(|conn| {
        diesel::update(files_dsl::files.filter(files_dsl::id.eq(file_id)))
            .set(files_dsl::public.eq(public))
            .execute(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error sharing file: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error sharing file: {:?}", e);
        AppError::DBError
    })
    .and_then(|updated| if updated == 0 { Err(AppError::NotFound) } else { Ok(()) })
}

pub async fn delete_photo(conn: Connection, photo_id: String) -> Result<usize, AppError> {
    conn.interact(|conn| {
        diesel::delete(photos_dsl::photos.filter(photos_dsl::id.eq(photo_id))).execute(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error deleting photo: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error deleting photo: {:?}", e);
        AppError::DBError
    })
}

pub async fn delete_file(conn: Connection, file_id: String) -> Result<usize, AppError> {
    conn.interact(|conn| {
        diesel::delete(files_dsl::files.filter(files_dsl::id.eq(file_id))).execute(conn)
    })
    .await
    .map_err(|e| {
        tracing::error!("error deleting file: {:?}", e);
        AppError::DBError
    })?
    .map_err(|e| {
        tracing::error!("error deleting file: {:?}", e);
        AppError::DBError
    })
}

#[cfg(test)]
pub async fn count_photos(conn: Connection) -> Result<i64, AppError> {
    conn.interact(|conn| photos_dsl::photos.count().get_result(conn))
        .await
        .map_err(|e| {
            tracing::error!("error counting photos: {:?}", e);
            AppError::DBError
        })?
        .map_err(|e| {
            tracing::error!("error counting photos: {:?}", e);
            AppError::DBError
        })
}

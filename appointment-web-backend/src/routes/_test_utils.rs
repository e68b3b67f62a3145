use std::{collections::HashMap, path::PathBuf, sync::Arc};

use axum::Router;
use axum_test::{TestServer, TestServerConfig};
use deadpool_diesel::sqlite::Connection;
use fake::{Fake, Faker};
use http::HeaderValue;

use crate::{
    auth::hash_password,
    db::{make_pool, run_migrations, sessions::new_session, users::new_user},
    i18n::Catalog,
    mail::RecordingMailer,
    models::{user::RegisterForm, NewUser, User},
    routes::with_identity,
    settings::Settings,
    types::{AppState, Claims},
};

/// A server over a fresh database, blob directory and recording mailer.
pub(crate) struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub mail: Arc<RecordingMailer>,
    root: PathBuf,
}

pub(crate) async fn test_app(router_to_test: Router<AppState>) -> anyhow::Result<TestApp> {
    let root = std::env::temp_dir().join(format!("appointment-web-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root)?;
    let settings = Settings::for_tests(&root);
    let pool = make_pool(&settings.database_url);
    run_migrations(&pool).await?;
    let mail = Arc::new(RecordingMailer::default());
    let st = AppState::new(settings, pool, test_catalog(), mail.clone())?;
    st.blobs().ensure_root().await?;
    let app = with_identity(router_to_test, st.clone());
    let cfg = TestServerConfig {
        ..TestServerConfig::default()
    };
    Ok(TestApp {
        server: TestServer::new_with_config(app, cfg)?,
        state: st,
        mail,
        root,
    })
}

fn test_catalog() -> Catalog {
    let mut catalog = Catalog::default();
    catalog.insert(
        "de",
        HashMap::from([
            ("Appointments".to_string(), "Termine".to_string()),
            ("Page not found".to_string(), "Seite nicht gefunden".to_string()),
        ]),
    );
    catalog
}

impl TestApp {
    pub async fn conn(&self) -> anyhow::Result<Connection> {
        Ok(self.state.conn().await?)
    }

    /// Registers `email` and returns the user with a bearer header for a fresh session.
    pub async fn sign_in(&self, email: &str) -> anyhow::Result<(User, HeaderValue)> {
        let form = Faker.fake::<RegisterForm>();
        let user = new_user(
            self.conn().await?,
            NewUser {
                id: uuid::Uuid::new_v4().to_string(),
                email: email.to_string(),
                name: form.name,
                password: hash_password(&form.password)?,
            },
        )
        .await?;
        let session = new_session(self.state.pool(), user.id.clone(), 1).await?;
        let token = Claims::from_session(&session).to_token(self.state.encoding())?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))?;
        Ok((user, bearer))
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

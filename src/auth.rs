/*!
Working out who a user is.

Identities live in two disjoint places (staff and academics), each reached
through an `IdentityLookup`. The `UtenteService` asks them in order, staff
first, and stops at the first one that knows the email address.
*/
use std::sync::Arc;

use async_trait::async_trait;

use crate::store::{DbError, Store};
use crate::user::Utente;

/// What an `IdentityLookup` can go wrong with.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The backing store's own "no such row" signal. The resolver treats
    /// this exactly like `Ok(None)`.
    #[error("no matching row")]
    NoRow,
    #[error(transparent)]
    Store(#[from] DbError),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// An identity exists for the email, but the password is wrong.
    #[error("Credenziali non valide")]
    Authentication,
    #[error(transparent)]
    Store(#[from] DbError),
}

/// One repository of identities, searchable by email.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    async fn find_by_email(&self, email: &str) -> Result<Option<Utente>, LookupError>;

    /**
    The repository's own notion of "this email with this password".

    Staff repositories return a match only on an exact password. Academic
    repositories also return the identity when no password has been set
    yet, so the caller can tell an account that is waiting for activation
    apart from a wrong password.
    */
    async fn find_by_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Utente>, LookupError>;
}

/// Decides whether a supplied password matches what's on file.
pub trait CredentialPolicy: Send + Sync {
    fn credentials_match(&self, stored: Option<&str>, supplied: &str) -> bool;
}

/**
Passwords are stored in the clear and compared for exact equality.

An identity with no stored password never matches.
*/
#[derive(Debug, Default)]
pub struct PlaintextPolicy;

impl CredentialPolicy for PlaintextPolicy {
    fn credentials_match(&self, stored: Option<&str>, supplied: &str) -> bool {
        match stored {
            Some(stored) => stored == supplied,
            None => false,
        }
    }
}

/// Result of a login attempt.
#[derive(Debug, PartialEq)]
pub enum LoginOutcome {
    Success(Utente),
    /// Academic account that has never had a password set.
    NotActivated,
    Failed,
}

pub struct UtenteService {
    lookups: Vec<Arc<dyn IdentityLookup>>,
    policy: Arc<dyn CredentialPolicy>,
}

impl std::fmt::Debug for UtenteService {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let names: Vec<&str> = self.lookups.iter().map(|l| l.name()).collect();
        f.debug_struct("UtenteService")
            .field("lookups", &names)
            .finish()
    }
}

impl UtenteService {
    /// `lookups` are consulted in the order given. A `policy` of `None`
    /// means `PlaintextPolicy`.
    pub fn new(
        lookups: Vec<Arc<dyn IdentityLookup>>,
        policy: Option<Arc<dyn CredentialPolicy>>,
    ) -> Self {
        let policy = policy.unwrap_or_else(|| Arc::new(PlaintextPolicy));
        Self { lookups, policy }
    }

    /// The usual arrangement: staff table first, then academics.
    pub fn from_store(store: Arc<Store>) -> Self {
        let lookups: Vec<Arc<dyn IdentityLookup>> = vec![
            Arc::new(StaffDirectory(store.clone())),
            Arc::new(AcademicDirectory(store)),
        ];
        Self::new(lookups, None)
    }

    pub async fn retrieve_by_email(&self, email: &str) -> Result<Option<Utente>, AuthError> {
        log::trace!("UtenteService::retrieve_by_email( {:?} ) called.", email);

        for lookup in self.lookups.iter() {
            match lookup.find_by_email(email).await {
                Ok(Some(u)) => {
                    log::trace!("    ...found in {}.", lookup.name());
                    return Ok(Some(u));
                },
                Ok(None) | Err(LookupError::NoRow) => { /* try the next one */ },
                Err(LookupError::Store(e)) => {
                    log::error!(
                        "Error looking up {:?} in {}: {}",
                        email, lookup.name(), &e
                    );
                    return Err(AuthError::Store(e));
                },
            }
        }

        Ok(None)
    }

    pub async fn retrieve_by_user_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Utente>, AuthError> {
        log::trace!(
            "UtenteService::retrieve_by_user_and_password( {:?}, [ password ] ) called.",
            email
        );

        let u = match self.retrieve_by_email(email).await? {
            Some(u) => u,
            None => { return Ok(None); },
        };

        if self.policy.credentials_match(u.password(), password) {
            Ok(Some(u))
        } else {
            log::trace!("    ...password mismatch for {:?}.", email);
            Err(AuthError::Authentication)
        }
    }

    /**
    Decide the fate of a login form submission.

    The first repository to report a match decides. Staff matches always
    succeed. An academic match succeeds only when the account is activated;
    an unactivated account without a password yields `NotActivated`, and
    one with a password yields `Failed`.
    */
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        log::trace!("UtenteService::login( {:?}, [ password ] ) called.", email);

        for lookup in self.lookups.iter() {
            let u = match lookup.find_by_email_and_password(email, password).await {
                Ok(Some(u)) => u,
                Ok(None) | Err(LookupError::NoRow) => { continue; },
                Err(LookupError::Store(e)) => {
                    log::error!(
                        "Error checking credentials of {:?} in {}: {}",
                        email, lookup.name(), &e
                    );
                    return Err(AuthError::Store(e));
                },
            };

            let outcome = match u {
                Utente::PersonaleTA(_) => LoginOutcome::Success(u),
                Utente::Accademico(ref a) if a.attivato => LoginOutcome::Success(u),
                Utente::Accademico(ref a) if a.password.is_none() => LoginOutcome::NotActivated,
                Utente::Accademico(_) => LoginOutcome::Failed,
            };
            log::debug!("Login of {:?} via {}: {:?}", email, lookup.name(), &outcome);
            return Ok(outcome);
        }

        Ok(LoginOutcome::Failed)
    }
}

/// `IdentityLookup` over the `personale_ta` table.
pub struct StaffDirectory(pub Arc<Store>);

#[async_trait]
impl IdentityLookup for StaffDirectory {
    fn name(&self) -> &'static str { "personale_ta" }

    async fn find_by_email(&self, email: &str) -> Result<Option<Utente>, LookupError> {
        let p = self.0.get_personale_by_email(email).await?;
        Ok(p.map(Utente::from))
    }

    async fn find_by_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Utente>, LookupError> {
        let p = self.0.get_personale_by_email_and_password(email, password).await?;
        Ok(p.map(Utente::from))
    }
}

/// `IdentityLookup` over the `accademici` table.
pub struct AcademicDirectory(pub Arc<Store>);

#[async_trait]
impl IdentityLookup for AcademicDirectory {
    fn name(&self) -> &'static str { "accademici" }

    async fn find_by_email(&self, email: &str) -> Result<Option<Utente>, LookupError> {
        let a = self.0.get_accademico_by_email(email).await?;
        Ok(a.map(Utente::from))
    }

    async fn find_by_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Utente>, LookupError> {
        let a = match self.0.get_accademico_by_email(email).await? {
            Some(a) => a,
            None => { return Ok(None); },
        };

        match a.password.as_deref() {
            None => Ok(Some(a.into())),
            Some(p) if p == password => Ok(Some(a.into())),
            Some(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;

    use crate::testing::*;
    use crate::tests::ensure_logging;
    use crate::user::Tipo;

    fn service(staff: &Arc<FakeLookup>, academic: &Arc<FakeLookup>) -> UtenteService {
        let lookups: Vec<Arc<dyn IdentityLookup>> = vec![staff.clone(), academic.clone()];
        UtenteService::new(lookups, None)
    }

    #[tokio::test]
    async fn staff_match_skips_academic_lookup() {
        ensure_logging();
        let staff = Arc::new(FakeLookup::staff(vec![
            personale("admin@unisa.it", Some("passwordSicura")),
        ]));
        let academic = Arc::new(FakeLookup::academic(vec![]));
        let svc = service(&staff, &academic);

        let u = svc.retrieve_by_email("admin@unisa.it").await.unwrap().unwrap();
        assert!(u.is_personale_ta());
        assert_eq!(staff.calls(), 1);
        assert_eq!(academic.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_email_is_absent() {
        let staff = Arc::new(FakeLookup::staff(vec![]));
        let academic = Arc::new(FakeLookup::academic(vec![]));
        let svc = service(&staff, &academic);

        assert!(svc.retrieve_by_email("nessuno@unisa.it").await.unwrap().is_none());
        assert_eq!(academic.calls(), 1);
        assert!(svc.retrieve_by_user_and_password("nessuno@unisa.it", "x")
            .await.unwrap().is_none());
    }

    #[tokio::test]
    async fn password_must_match_exactly() {
        let staff = Arc::new(FakeLookup::staff(vec![]));
        let academic = Arc::new(FakeLookup::academic(vec![
            accademico("0512100001", "prof@unisa.it", Some("passwordProf"), true, Tipo::Docente),
            accademico("0512100002", "stud@unisa.it", Some("giusta"), true, Tipo::Studente),
        ]));
        let svc = service(&staff, &academic);

        let u = svc.retrieve_by_user_and_password("prof@unisa.it", "passwordProf")
            .await.unwrap().unwrap();
        assert_eq!(u.kind(), "Docente");

        for wrong in ["sbagliata", "passwordprof", "passwordProf ", ""] {
            let res = svc.retrieve_by_user_and_password("prof@unisa.it", wrong).await;
            assert!(matches!(res, Err(AuthError::Authentication)), "{:?}", wrong);
        }
        assert!(matches!(
            svc.retrieve_by_user_and_password("stud@unisa.it", "sbagliata").await,
            Err(AuthError::Authentication)
        ));
    }

    #[tokio::test]
    async fn admin_credentials_resolve_to_staff() {
        let staff = Arc::new(FakeLookup::staff(vec![
            personale("admin@unisa.it", Some("passwordSicura")),
        ]));
        let academic = Arc::new(FakeLookup::academic(vec![]));
        let svc = service(&staff, &academic);

        let u = svc.retrieve_by_user_and_password("admin@unisa.it", "passwordSicura")
            .await.unwrap().unwrap();
        assert!(u.is_personale_ta());
        assert_eq!(u.email(), "admin@unisa.it");
        assert_eq!(academic.calls(), 0);
    }

    #[tokio::test]
    async fn missing_stored_password_never_matches() {
        let staff = Arc::new(FakeLookup::staff(vec![]));
        let academic = Arc::new(FakeLookup::academic(vec![
            accademico("0512100003", "nuovo@unisa.it", None, false, Tipo::Studente),
        ]));
        let svc = service(&staff, &academic);

        assert!(matches!(
            svc.retrieve_by_user_and_password("nuovo@unisa.it", "").await,
            Err(AuthError::Authentication)
        ));
    }

    #[tokio::test]
    async fn retrieval_is_idempotent() {
        let staff = Arc::new(FakeLookup::staff(vec![]));
        let academic = Arc::new(FakeLookup::academic(vec![
            accademico("0512100001", "prof@unisa.it", Some("passwordProf"), true, Tipo::Docente),
        ]));
        let svc = service(&staff, &academic);

        let first = svc.retrieve_by_email("prof@unisa.it").await.unwrap();
        let second = svc.retrieve_by_email("prof@unisa.it").await.unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn no_row_signal_is_absent() {
        let staff = Arc::new(FakeLookup::no_row());
        let academic = Arc::new(FakeLookup::no_row());
        let svc = service(&staff, &academic);

        assert!(svc.retrieve_by_email("chiunque@unisa.it").await.unwrap().is_none());
        assert_eq!(academic.calls(), 1);
        assert!(svc.retrieve_by_user_and_password("chiunque@unisa.it", "x")
            .await.unwrap().is_none());
        assert_eq!(svc.login("chiunque@unisa.it", "x").await.unwrap(), LoginOutcome::Failed);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let staff = Arc::new(FakeLookup::broken());
        let academic = Arc::new(FakeLookup::academic(vec![]));
        let svc = service(&staff, &academic);

        assert!(matches!(
            svc.retrieve_by_email("admin@unisa.it").await,
            Err(AuthError::Store(_))
        ));
        assert_eq!(academic.calls(), 0);
    }

    #[tokio::test]
    async fn custom_policy_replaces_comparison() {
        struct Anything;
        impl CredentialPolicy for Anything {
            fn credentials_match(&self, _: Option<&str>, _: &str) -> bool { true }
        }

        let staff: Arc<dyn IdentityLookup> = Arc::new(FakeLookup::staff(vec![
            personale("admin@unisa.it", Some("passwordSicura")),
        ]));
        let svc = UtenteService::new(vec![staff], Some(Arc::new(Anything)));
        assert!(svc.retrieve_by_user_and_password("admin@unisa.it", "qualsiasi")
            .await.unwrap().is_some());
    }

    #[tokio::test]
    async fn login_dispatch() {
        ensure_logging();
        let staff = Arc::new(FakeLookup::staff(vec![
            personale("admin@unisa.it", Some("passwordSicura")),
        ]));
        let academic = Arc::new(FakeLookup::academic(vec![
            accademico("0512100001", "attivo@unisa.it", Some("pw"), true, Tipo::Studente),
            accademico("0512100002", "nuovo@unisa.it", None, false, Tipo::Studente),
            accademico("0512100003", "sospeso@unisa.it", Some("pw"), false, Tipo::Docente),
        ]));
        let svc = service(&staff, &academic);

        assert!(matches!(
            svc.login("admin@unisa.it", "passwordSicura").await.unwrap(),
            LoginOutcome::Success(Utente::PersonaleTA(_))
        ));
        assert!(matches!(
            svc.login("attivo@unisa.it", "pw").await.unwrap(),
            LoginOutcome::Success(Utente::Accademico(_))
        ));
        assert_eq!(svc.login("attivo@unisa.it", "no").await.unwrap(), LoginOutcome::Failed);
        assert_eq!(
            svc.login("nuovo@unisa.it", "qualsiasi").await.unwrap(),
            LoginOutcome::NotActivated
        );
        assert_eq!(svc.login("sospeso@unisa.it", "pw").await.unwrap(), LoginOutcome::Failed);
        assert_eq!(svc.login("admin@unisa.it", "no").await.unwrap(), LoginOutcome::Failed);
        assert_eq!(svc.login("nessuno@unisa.it", "pw").await.unwrap(), LoginOutcome::Failed);
    }

    #[tokio::test]
    #[ignore]
    #[serial]
    async fn store_backed_login() {
        use crate::store::tests::TEST_CONNECTION;

        ensure_logging();
        let store = Store::new(TEST_CONNECTION.to_owned());
        store.ensure_db_schema().await.unwrap();

        store.insert_personale(&personale("admin@unisa.it", Some("passwordSicura"))).await.unwrap();
        for a in [
            accademico("0512100001", "attivo@unisa.it", Some("pw"), true, Tipo::Studente),
            accademico("0512100002", "nuovo@unisa.it", None, false, Tipo::Studente),
            accademico("0512100003", "sospeso@unisa.it", Some("pw"), false, Tipo::Docente),
        ].iter() {
            store.insert_accademico(a).await.unwrap();
        }

        let store = Arc::new(store);
        let svc = UtenteService::from_store(store.clone());

        match svc.login("admin@unisa.it", "passwordSicura").await.unwrap() {
            LoginOutcome::Success(Utente::PersonaleTA(p)) => assert_eq!(p.email, "admin@unisa.it"),
            x => panic!("expected staff Success, got {:?}", x),
        }
        assert_eq!(svc.login("admin@unisa.it", "no").await.unwrap(), LoginOutcome::Failed);

        match svc.login("attivo@unisa.it", "pw").await.unwrap() {
            LoginOutcome::Success(Utente::Accademico(a)) => assert_eq!(a.matricola, "0512100001"),
            x => panic!("expected academic Success, got {:?}", x),
        }
        assert_eq!(svc.login("attivo@unisa.it", "no").await.unwrap(), LoginOutcome::Failed);
        assert_eq!(
            svc.login("nuovo@unisa.it", "qualsiasi").await.unwrap(),
            LoginOutcome::NotActivated
        );
        assert_eq!(svc.login("sospeso@unisa.it", "pw").await.unwrap(), LoginOutcome::Failed);
        assert_eq!(svc.login("nessuno@unisa.it", "pw").await.unwrap(), LoginOutcome::Failed);

        assert_eq!(
            svc.retrieve_by_email("nuovo@unisa.it").await.unwrap().map(|u| u.email().to_owned()),
            Some("nuovo@unisa.it".to_owned())
        );
        assert!(svc.retrieve_by_email("nessuno@unisa.it").await.unwrap().is_none());
        assert!(matches!(
            svc.retrieve_by_user_and_password("admin@unisa.it", "no").await,
            Err(AuthError::Authentication)
        ));

        store.nuke_database().await.unwrap();
    }

    #[test]
    fn plaintext_policy() {
        let p = PlaintextPolicy;
        assert!(p.credentials_match(Some("giusta"), "giusta"));
        assert!(!p.credentials_match(Some("giusta"), "sbagliata"));
        assert!(!p.credentials_match(None, ""));
    }
}

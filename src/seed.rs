//! Demo roster seeding
//!
//! Populates an empty database with a fixed company roster so a fresh
//! deployment is usable immediately. Seeding is idempotent: any existing
//! users mean the roster is left alone.

use crate::auth::PasswordHash;
use crate::error::Result;
use crate::storage::Store;
use crate::types::{User, UserId};
use chrono::Utc;
use tracing::info;

/// Shared password for every demo account
const DEMO_PASSWORD: &str = "password123";

/// (name, email, department, job title)
const ROSTER: &[(&str, &str, &str, &str)] = &[
    ("Alex Johnson", "alex.johnson@company.com", "Product", "Product Manager"),
    ("Sarah Chen", "sarah.chen@company.com", "Product", "Senior Designer"),
    ("Mike Rodriguez", "mike.rodriguez@company.com", "Product", "Product Analyst"),
    ("Emily Davis", "emily.davis@company.com", "Engineering", "Tech Lead"),
    ("James Wilson", "james.wilson@company.com", "Engineering", "Senior Developer"),
    ("Lisa Thompson", "lisa.thompson@company.com", "Engineering", "Frontend Developer"),
    ("David Park", "david.park@company.com", "Marketing", "Marketing Director"),
    ("Maria Garcia", "maria.garcia@company.com", "Marketing", "Content Manager"),
    ("Kevin Zhang", "kevin.zhang@company.com", "Marketing", "Digital Marketer"),
    ("Rachel Green", "rachel.green@company.com", "Sales", "Sales Director"),
    ("Tom Anderson", "tom.anderson@company.com", "Sales", "Account Manager"),
    ("Sophie Taylor", "sophie.taylor@company.com", "Sales", "Sales Representative"),
    ("Jessica Brown", "jessica.brown@company.com", "HR", "HR Director"),
    ("Robert Kim", "robert.kim@company.com", "HR", "HR Business Partner"),
    ("Olivia Lee", "olivia.lee@company.com", "HR", "Recruiter"),
    ("Michael Brown", "michael.brown@company.com", "Finance", "Finance Manager"),
    ("Jennifer White", "jennifer.white@company.com", "Finance", "Financial Analyst"),
    ("Chris Miller", "chris.miller@company.com", "Finance", "Accountant"),
    ("Amanda Wilson", "amanda.wilson@company.com", "Operations", "Operations Manager"),
    ("Daniel Lee", "daniel.lee@company.com", "Operations", "Project Manager"),
    ("Maya Patel", "maya.patel@company.com", "Operations", "Operations Coordinator"),
];

/// Seed the demo roster if the users table is empty
///
/// Returns the number of users inserted (zero when seeding was skipped).
pub async fn seed_users(store: &dyn Store) -> Result<u64> {
    let existing = store.count_users().await?;
    if existing > 0 {
        info!("Users already present ({}), skipping seed", existing);
        return Ok(0);
    }

    let now = Utc::now();
    let users: Vec<User> = ROSTER
        .iter()
        .map(|(name, email, department, job_title)| User {
            id: UserId::new(),
            name: name.to_string(),
            email: email.to_string(),
            department: department.to_string(),
            job_title: job_title.to_string(),
            password_hash: PasswordHash::hash(DEMO_PASSWORD),
            created_at: now,
        })
        .collect();

    store.insert_users(&users).await?;
    info!("Seeded {} demo users", users.len());
    Ok(users.len() as u64)
}

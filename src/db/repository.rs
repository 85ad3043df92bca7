//! Database repository for CRUD operations.
//!
//! Uses prepared statements; the employee-ID counter is advanced with a
//! single atomic upsert so concurrent user creation never duplicates IDs.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Activity, ActivityType, ContactType, CreateActivityRequest, DailyPlan, Portfolio, Role,
    UpdateActivityRequest, User,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== COUNTER OPERATIONS ====================

    /// Atomically advance the per-role employee counter and return the new
    /// value. Single upsert statement: two concurrent calls for the same
    /// role always observe distinct numbers.
    pub async fn next_emp_number(&self, role: Role) -> Result<i64, AppError> {
        let row = sqlx::query(
            r#"INSERT INTO emp_counters (role, last_number) VALUES (?, 1)
               ON CONFLICT(role) DO UPDATE SET last_number = last_number + 1
               RETURNING last_number"#,
        )
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("last_number"))
    }

    // ==================== USER OPERATIONS ====================

    /// Insert a new user. The password hash must already be computed.
    pub async fn create_user(
        &self,
        emp_id: &str,
        name: &str,
        role: Role,
        mobile: Option<&str>,
        password_hash: &str,
        manager_id: Option<&str>,
    ) -> Result<User, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO users (id, emp_id, name, role, mobile, password_hash, manager_id,
                                  profile_pic_key, active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, NULL, 1, ?, ?)"#,
        )
        .bind(&id)
        .bind(emp_id)
        .bind(name)
        .bind(role.as_str())
        .bind(mobile)
        .bind(password_hash)
        .bind(manager_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Employee ID {} already exists", emp_id))
            }
            _ => AppError::from(e),
        })?;

        Ok(User {
            id,
            emp_id: emp_id.to_string(),
            name: name.to_string(),
            role,
            mobile: mobile.map(|s| s.to_string()),
            password_hash: password_hash.to_string(),
            manager_id: manager_id.map(|s| s.to_string()),
            profile_pic_key: None,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Get a user by employee ID.
    pub async fn get_user_by_emp_id(&self, emp_id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query("SELECT * FROM users WHERE emp_id = ?")
            .bind(emp_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// List a manager's direct reports.
    pub async fn list_direct_reports(&self, manager_id: &str) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query("SELECT * FROM users WHERE manager_id = ? ORDER BY emp_id")
            .bind(manager_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(user_from_row).collect()
    }

    /// Whether any RBM exists. Guards the one-time bootstrap.
    pub async fn rbm_exists(&self) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE role = ?")
            .bind(Role::RBM.as_str())
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n > 0)
    }

    /// Partial self-update; absent fields keep their stored value.
    pub async fn update_user_profile(
        &self,
        id: &str,
        name: Option<&str>,
        mobile: Option<&str>,
        password_hash: Option<&str>,
        profile_pic_key: Option<&str>,
    ) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"UPDATE users SET
                   name = COALESCE(?, name),
                   mobile = COALESCE(?, mobile),
                   password_hash = COALESCE(?, password_hash),
                   profile_pic_key = COALESCE(?, profile_pic_key),
                   updated_at = ?
               WHERE id = ?"#,
        )
        .bind(name)
        .bind(mobile)
        .bind(password_hash)
        .bind(profile_pic_key)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    /// Delete a single user row. Cascade semantics live in the hierarchy
    /// walker, not here.
    pub async fn delete_user(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Users whose `manager_id` references a user that no longer exists.
    pub async fn find_orphans(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(
            r#"SELECT u.* FROM users u
               WHERE u.manager_id IS NOT NULL
                 AND NOT EXISTS (SELECT 1 FROM users m WHERE m.id = u.manager_id)"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    // ==================== ACTIVITY OPERATIONS ====================

    /// Create a new activity. Activities are published on creation; there
    /// is no draft workflow.
    pub async fn create_activity(
        &self,
        creator_id: &str,
        emp_id: &str,
        request: &CreateActivityRequest,
    ) -> Result<Activity, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let photos_json = serde_json::to_string(&request.photos).unwrap_or_default();

        sqlx::query(
            r#"INSERT INTO activities (
                   id, creator_id, emp_id, title, farmer_name, farmer_mobile, village, taluka,
                   district, crop_or_hybrid, farmers_involved, tentative_expense, remarks,
                   activity_type, contact_type, photos, is_published, published_at, deleted_at,
                   created_at, updated_at
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, NULL, ?, ?)"#,
        )
        .bind(&id)
        .bind(creator_id)
        .bind(emp_id)
        .bind(&request.title)
        .bind(&request.farmer_name)
        .bind(&request.farmer_mobile)
        .bind(&request.village)
        .bind(&request.taluka)
        .bind(&request.district)
        .bind(&request.crop_or_hybrid)
        .bind(request.farmers_involved)
        .bind(request.tentative_expense)
        .bind(&request.remarks)
        .bind(request.activity_type.as_str())
        .bind(request.contact_type.map(|c| c.as_str()))
        .bind(&photos_json)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Activity {
            id,
            creator_id: creator_id.to_string(),
            emp_id: emp_id.to_string(),
            title: request.title.clone(),
            farmer_name: request.farmer_name.clone(),
            farmer_mobile: request.farmer_mobile.clone(),
            village: request.village.clone(),
            taluka: request.taluka.clone(),
            district: request.district.clone(),
            crop_or_hybrid: request.crop_or_hybrid.clone(),
            farmers_involved: request.farmers_involved,
            tentative_expense: request.tentative_expense,
            remarks: request.remarks.clone(),
            activity_type: request.activity_type,
            contact_type: request.contact_type,
            photo_keys: request.photos.clone(),
            is_published: true,
            published_at: Some(now.clone()),
            deleted_at: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get an activity by ID.
    pub async fn get_activity(&self, id: &str) -> Result<Option<Activity>, AppError> {
        let row = sqlx::query("SELECT * FROM activities WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(activity_from_row).transpose()
    }

    /// List activities created by any of the given users, newest first.
    pub async fn list_activities_for_creators(
        &self,
        creator_ids: &[String],
    ) -> Result<Vec<Activity>, AppError> {
        if creator_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; creator_ids.len()].join(", ");
        let sql = format!(
            "SELECT * FROM activities WHERE creator_id IN ({}) AND deleted_at IS NULL \
             ORDER BY created_at DESC",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in creator_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(activity_from_row).collect()
    }

    /// Apply an RBM correction; absent fields keep their stored value, a
    /// present photo list replaces the stored one wholesale.
    pub async fn update_activity(
        &self,
        id: &str,
        request: &UpdateActivityRequest,
    ) -> Result<Activity, AppError> {
        let existing = self
            .get_activity(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))?;

        let now = Utc::now().to_rfc3339();
        let photo_keys = request
            .photos
            .clone()
            .unwrap_or_else(|| existing.photo_keys.clone());
        let photos_json = serde_json::to_string(&photo_keys).unwrap_or_default();

        sqlx::query(
            r#"UPDATE activities SET
                   title = COALESCE(?, title),
                   farmer_name = COALESCE(?, farmer_name),
                   farmer_mobile = COALESCE(?, farmer_mobile),
                   village = COALESCE(?, village),
                   taluka = COALESCE(?, taluka),
                   district = COALESCE(?, district),
                   crop_or_hybrid = COALESCE(?, crop_or_hybrid),
                   farmers_involved = COALESCE(?, farmers_involved),
                   tentative_expense = COALESCE(?, tentative_expense),
                   remarks = COALESCE(?, remarks),
                   photos = ?,
                   updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&request.title)
        .bind(&request.farmer_name)
        .bind(&request.farmer_mobile)
        .bind(&request.village)
        .bind(&request.taluka)
        .bind(&request.district)
        .bind(&request.crop_or_hybrid)
        .bind(request.farmers_involved)
        .bind(request.tentative_expense)
        .bind(&request.remarks)
        .bind(&photos_json)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_activity(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))
    }

    /// Delete an activity.
    pub async fn delete_activity(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM activities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Activity {} not found", id)));
        }
        Ok(())
    }

    /// Delete all activities created by one user (cascade path).
    pub async fn delete_activities_by_creator(&self, creator_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM activities WHERE creator_id = ?")
            .bind(creator_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== DAILY PLAN OPERATIONS ====================

    /// File a plan. No uniqueness on (user, date): several plans for the
    /// same day are allowed to coexist.
    pub async fn create_plan(
        &self,
        user_id: &str,
        date: &str,
        villages: &[String],
        remarks: Option<&str>,
    ) -> Result<DailyPlan, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let villages_json = serde_json::to_string(villages).unwrap_or_default();

        sqlx::query(
            r#"INSERT INTO daily_plans (id, user_id, date, villages, remarks, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(date)
        .bind(&villages_json)
        .bind(remarks)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(DailyPlan {
            id,
            user_id: user_id.to_string(),
            date: date.to_string(),
            villages: villages.to_vec(),
            remarks: remarks.map(|s| s.to_string()),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a plan by ID.
    pub async fn get_plan(&self, id: &str) -> Result<Option<DailyPlan>, AppError> {
        let row = sqlx::query("SELECT * FROM daily_plans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(plan_from_row))
    }

    /// List a user's plans, most recent date first.
    pub async fn list_plans_for_user(&self, user_id: &str) -> Result<Vec<DailyPlan>, AppError> {
        let rows = sqlx::query(
            "SELECT * FROM daily_plans WHERE user_id = ? ORDER BY date DESC, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(plan_from_row).collect())
    }

    /// Delete a plan.
    pub async fn delete_plan(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM daily_plans WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete all plans owned by one user (cascade path).
    pub async fn delete_plans_by_user(&self, user_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM daily_plans WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== PORTFOLIO OPERATIONS ====================

    /// Create a new portfolio.
    pub async fn create_portfolio(
        &self,
        creator_id: &str,
        name: &str,
        image_keys: &[String],
    ) -> Result<Portfolio, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let images_json = serde_json::to_string(image_keys).unwrap_or_default();

        sqlx::query(
            r#"INSERT INTO portfolios (id, name, images, creator_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(name)
        .bind(&images_json)
        .bind(creator_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Portfolio {
            id,
            name: name.to_string(),
            image_keys: image_keys.to_vec(),
            creator_id: creator_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a portfolio by ID.
    pub async fn get_portfolio(&self, id: &str) -> Result<Option<Portfolio>, AppError> {
        let row = sqlx::query("SELECT * FROM portfolios WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(portfolio_from_row))
    }

    /// List all portfolios, newest first.
    pub async fn list_portfolios(&self) -> Result<Vec<Portfolio>, AppError> {
        let rows = sqlx::query("SELECT * FROM portfolios ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(portfolio_from_row).collect())
    }

    /// Replace a portfolio's name and image set.
    pub async fn update_portfolio(
        &self,
        id: &str,
        name: &str,
        image_keys: &[String],
    ) -> Result<Portfolio, AppError> {
        let now = Utc::now().to_rfc3339();
        let images_json = serde_json::to_string(image_keys).unwrap_or_default();

        let result = sqlx::query(
            "UPDATE portfolios SET name = ?, images = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(&images_json)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Portfolio {} not found", id)));
        }

        self.get_portfolio(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Portfolio {} not found", id)))
    }

    /// Delete a portfolio.
    pub async fn delete_portfolio(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM portfolios WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Portfolio {} not found", id)));
        }
        Ok(())
    }
}

// Helper functions for row conversion

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, AppError> {
    let role_str: String = row.get("role");
    let role = Role::from_str(&role_str)
        .ok_or_else(|| AppError::Database(format!("Unknown role in users table: {}", role_str)))?;
    let active: i64 = row.get("active");

    Ok(User {
        id: row.get("id"),
        emp_id: row.get("emp_id"),
        name: row.get("name"),
        role,
        mobile: row.get("mobile"),
        password_hash: row.get("password_hash"),
        manager_id: row.get("manager_id"),
        profile_pic_key: row.get("profile_pic_key"),
        active: active != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn activity_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Activity, AppError> {
    let type_str: String = row.get("activity_type");
    let activity_type = ActivityType::from_str(&type_str).ok_or_else(|| {
        AppError::Database(format!("Unknown activity type in activities table: {}", type_str))
    })?;
    let contact_str: Option<String> = row.get("contact_type");
    let photos_str: String = row.get("photos");
    let is_published: i64 = row.get("is_published");

    Ok(Activity {
        id: row.get("id"),
        creator_id: row.get("creator_id"),
        emp_id: row.get("emp_id"),
        title: row.get("title"),
        farmer_name: row.get("farmer_name"),
        farmer_mobile: row.get("farmer_mobile"),
        village: row.get("village"),
        taluka: row.get("taluka"),
        district: row.get("district"),
        crop_or_hybrid: row.get("crop_or_hybrid"),
        farmers_involved: row.get("farmers_involved"),
        tentative_expense: row.get("tentative_expense"),
        remarks: row.get("remarks"),
        activity_type,
        contact_type: contact_str.as_deref().and_then(ContactType::from_str),
        photo_keys: parse_json_array(&photos_str),
        is_published: is_published != 0,
        published_at: row.get("published_at"),
        deleted_at: row.get("deleted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn plan_from_row(row: &sqlx::sqlite::SqliteRow) -> DailyPlan {
    let villages_str: String = row.get("villages");
    DailyPlan {
        id: row.get("id"),
        user_id: row.get("user_id"),
        date: row.get("date"),
        villages: parse_json_array(&villages_str),
        remarks: row.get("remarks"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn portfolio_from_row(row: &sqlx::sqlite::SqliteRow) -> Portfolio {
    let images_str: String = row.get("images");
    Portfolio {
        id: row.get("id"),
        name: row.get("name"),
        image_keys: parse_json_array(&images_str),
        creator_id: row.get("creator_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

//! PostgreSQL-backed `CourseCatalogueRepository`.
//!
//! The course and outline reads are shared with the enrollment store, which
//! serves the same rows for pre-flight checks.

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use super::error_mapping::{
    map_catalogue_decode_error, map_catalogue_error, map_catalogue_pool_error,
};
use super::models::{CourseRow, LessonRow, ModuleRow, RowDecodeError, assemble_outline};
use super::pool::DbPool;
use super::schema::{course_modules, courses, lessons};
use crate::domain::ports::{
    CourseCatalogueError, CourseCatalogueRepository, CoursePage, CourseSearch,
};
use crate::domain::{Course, CourseId, CourseOutline};

/// Committed course row, or `None` when the id is unknown.
pub(super) async fn load_course(
    conn: &mut AsyncPgConnection,
    id: CourseId,
) -> Result<Option<CourseRow>, diesel::result::Error> {
    courses::table
        .find(id.get())
        .select(CourseRow::as_select())
        .first(conn)
        .await
        .optional()
}

/// Modules and lessons of a course, ordered by position.
pub(super) async fn load_outline(
    conn: &mut AsyncPgConnection,
    id: CourseId,
) -> Result<CourseOutline, diesel::result::Error> {
    let modules: Vec<ModuleRow> = course_modules::table
        .filter(course_modules::course_id.eq(id.get()))
        .order((course_modules::position, course_modules::id))
        .select(ModuleRow::as_select())
        .load(conn)
        .await?;
    let lesson_rows: Vec<LessonRow> = lessons::table
        .inner_join(course_modules::table)
        .filter(course_modules::course_id.eq(id.get()))
        .order((lessons::position, lessons::id))
        .select(LessonRow::as_select())
        .load(conn)
        .await?;
    Ok(CourseOutline::new(assemble_outline(modules, lesson_rows)))
}

/// Escape `LIKE` wildcards so the query matches literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn filtered(search: &CourseSearch) -> courses::BoxedQuery<'static, Pg> {
    let mut query = courses::table
        .filter(courses::status.eq(search.status.as_str()))
        .into_boxed();
    if !search.query.is_empty() {
        query = query.filter(courses::title.ilike(like_pattern(&search.query)));
    }
    query
}

/// Diesel-backed course catalogue.
#[derive(Clone)]
pub struct DieselCourseCatalogueRepository {
    pool: DbPool,
}

impl DieselCourseCatalogueRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseCatalogueRepository for DieselCourseCatalogueRepository {
    async fn find_course(&self, id: CourseId) -> Result<Option<Course>, CourseCatalogueError> {
        let mut conn = self.pool.get().await.map_err(map_catalogue_pool_error)?;
        load_course(&mut conn, id)
            .await
            .map_err(map_catalogue_error)?
            .map(CourseRow::into_domain)
            .transpose()
            .map_err(map_catalogue_decode_error)
    }

    async fn course_outline(&self, id: CourseId) -> Result<CourseOutline, CourseCatalogueError> {
        let mut conn = self.pool.get().await.map_err(map_catalogue_pool_error)?;
        load_outline(&mut conn, id).await.map_err(map_catalogue_error)
    }

    async fn search(&self, search: &CourseSearch) -> Result<CoursePage, CourseCatalogueError> {
        let mut conn = self.pool.get().await.map_err(map_catalogue_pool_error)?;

        let total: i64 = filtered(search)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_catalogue_error)?;
        let rows: Vec<CourseRow> = filtered(search)
            .order(courses::id)
            .limit(i64::from(search.per_page))
            .offset(i64::try_from(search.offset()).unwrap_or(i64::MAX))
            .select(CourseRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_catalogue_error)?;

        let courses = rows
            .into_iter()
            .map(CourseRow::into_domain)
            .collect::<Result<Vec<_>, RowDecodeError>>()
            .map_err(map_catalogue_decode_error)?;
        Ok(CoursePage {
            courses,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }
}

use anyhow::Result;
use sqlx::SqlitePool;

/// Create the tenant schema. Safe to run on an existing database.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Column names match databases created by earlier deployments.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documentos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tipo TEXT NOT NULL,
            numero TEXT NOT NULL,
            fecha DATE NOT NULL,
            fecha_creacion DATETIME DEFAULT CURRENT_TIMESTAMP,
            proveedor TEXT,
            ruta_archivo TEXT NOT NULL,
            hash_archivo TEXT,
            datos_extraidos TEXT,
            estado TEXT DEFAULT 'pendiente',
            notas TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS codigos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            documento_id INTEGER NOT NULL,
            codigo TEXT NOT NULL,
            descripcion TEXT,
            cantidad INTEGER,
            valor_unitario REAL,
            validado INTEGER DEFAULT 0,
            alerta TEXT,
            FOREIGN KEY (documento_id) REFERENCES documentos(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_codigos_documento ON codigos(documento_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_codigos_codigo ON codigos(codigo)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documentos_fecha ON documentos(fecha DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
